//! Spatial reference system rules

use std::collections::BTreeSet;

use gpkgcheck_catalog::{geometry_columns, Dataset};
use gpkgcheck_core::{Level, ValidationCode};

use crate::registry::RuleContext;
use crate::rule::{Rule, RuleError};

/// RQ12
pub struct AllowedSrsRule {
    allowed: Vec<i64>,
}

impl AllowedSrsRule {
    pub fn build(context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self {
            allowed: context.config.allowed_srs.clone(),
        })
    }
}

impl Rule for AllowedSrsRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 12)
    }

    fn description(&self) -> String {
        let allowed: Vec<_> = self.allowed.iter().map(|id| id.to_string()).collect();
        format!(
            "Only the following EPSG spatial reference systems are allowed: {}.",
            allowed.join(", ")
        )
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let rows = dataset.execute(
            "SELECT srs.organization, srs.organization_coordsys_id, srs.srs_name \
             FROM gpkg_geometry_columns AS ggc \
             JOIN gpkg_spatial_ref_sys AS srs ON srs.srs_id = ggc.srs_id \
             ORDER BY ggc.table_name",
        )?;

        let mut findings = Vec::new();
        for row in rows {
            let organization = row.text(0)?;
            let id = row.integer(1)?;

            let allowed = organization.eq_ignore_ascii_case("EPSG") && self.allowed.contains(&id);
            if !allowed {
                findings.push(format!(
                    "Found in 'gpkg_spatial_ref_sys' {} {}. {} is not allowed.",
                    organization,
                    id,
                    row.text(2)?
                ));
            }
        }

        Ok(findings)
    }
}

/// RQ13
pub struct SingleSrsRule;

impl SingleSrsRule {
    pub fn build(_context: &RuleContext) -> Box<dyn Rule> {
        Box::new(Self)
    }
}

impl Rule for SingleSrsRule {
    fn code(&self) -> ValidationCode {
        ValidationCode::new(Level::Error, 13)
    }

    fn description(&self) -> String {
        "It is required to give all GEOMETRY features the same default spatial reference system.".to_string()
    }

    fn check(&self, dataset: &dyn Dataset) -> Result<Vec<String>, RuleError> {
        let srs: BTreeSet<i64> = geometry_columns(dataset)?
            .into_iter()
            .filter_map(|c| c.srs_id)
            .collect();

        if srs.len() > 1 {
            let ids: Vec<_> = srs.iter().map(|id| id.to_string()).collect();
            return Ok(vec![format!("Found srs are: {}.", ids.join(", "))]);
        }

        Ok(Vec::new())
    }
}
