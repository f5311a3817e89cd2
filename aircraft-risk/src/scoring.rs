//! Risk scoring engine

use crate::{
    AccidentRecord, AircraftRecord, DirectiveRecord, Error, RiskAssessment, RiskFactor,
    RiskLevel, RiskScore,
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Starting points for every aircraft under the summary formula
pub const BASE_POINTS: u32 = 25;
/// Points per accident on record
pub const ACCIDENT_POINTS: u32 = 15;
/// Extra points per accident with fatalities
pub const FATAL_ACCIDENT_POINTS: u32 = 25;
/// Points per applicable directive
pub const DIRECTIVE_POINTS: u32 = 5;

/// Which weighting to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFormula {
    /// Base 25, age bands, 15 per accident, 25 per fatal accident,
    /// 5 per supplied directive
    #[default]
    Summary,
    /// 5 per open directive, 20 per accident, 2 per owner
    OwnerWeighted,
}

impl FromStr for RiskFormula {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(RiskFormula::Summary),
            "owner_weighted" => Ok(RiskFormula::OwnerWeighted),
            other => Err(Error::UnknownFormula(other.to_string())),
        }
    }
}

/// Everything the scorer looks at
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs<'a> {
    /// Year of manufacture
    pub year: Option<i32>,
    /// Owners on record
    pub owner_count: Option<u32>,
    /// Accidents for the aircraft
    pub accidents: &'a [AccidentRecord],
    /// Directives applicable to the make/model
    pub directives: &'a [DirectiveRecord],
}

impl<'a> ScoreInputs<'a> {
    /// Inputs from loose parts
    pub fn new(
        year: Option<i32>,
        accidents: &'a [AccidentRecord],
        directives: &'a [DirectiveRecord],
    ) -> Self {
        Self {
            year,
            owner_count: None,
            accidents,
            directives,
        }
    }

    /// Inputs for a stored aircraft
    pub fn for_aircraft(
        aircraft: &AircraftRecord,
        accidents: &'a [AccidentRecord],
        directives: &'a [DirectiveRecord],
    ) -> Self {
        Self {
            year: aircraft.year,
            owner_count: aircraft.owner_count,
            accidents,
            directives,
        }
    }

    fn fatal_accidents(&self) -> usize {
        self.accidents.iter().filter(|a| a.is_fatal()).count()
    }

    fn open_directives(&self) -> usize {
        self.directives.iter().filter(|d| d.is_open()).count()
    }
}

/// Risk scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScorer {
    formula: RiskFormula,
}

impl RiskScorer {
    /// Create new risk scorer using the summary formula
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scorer for a specific formula
    pub fn with_formula(formula: RiskFormula) -> Self {
        Self { formula }
    }

    /// Formula in use
    pub fn formula(&self) -> RiskFormula {
        self.formula
    }

    /// Point contributions, before clamping
    pub fn factors(&self, inputs: &ScoreInputs<'_>, current_year: i32) -> Vec<RiskFactor> {
        match self.formula {
            RiskFormula::Summary => summary_factors(inputs, current_year),
            RiskFormula::OwnerWeighted => owner_weighted_factors(inputs),
        }
    }

    /// Clamped score for `inputs` as of `current_year`
    pub fn score(&self, inputs: &ScoreInputs<'_>, current_year: i32) -> RiskScore {
        total(&self.factors(inputs, current_year))
    }

    /// Full assessment as of `current_year`
    pub fn assess(&self, inputs: &ScoreInputs<'_>, current_year: i32) -> RiskAssessment {
        let factors = self.factors(inputs, current_year);
        let risk_score = total(&factors);

        RiskAssessment {
            risk_score,
            risk_level: RiskLevel::from(risk_score),
            formula: self.formula,
            factors,
            open_directives: inputs.open_directives(),
            assessed_at: Utc::now(),
        }
    }

    /// Full assessment as of the current UTC year
    pub fn assess_now(&self, inputs: &ScoreInputs<'_>) -> RiskAssessment {
        self.assess(inputs, Utc::now().year())
    }
}

/// Age band points: >30 years 20, >20 years 10, >10 years 5
pub fn age_points(age: i32) -> u32 {
    match age {
        a if a > 30 => 20,
        a if a > 20 => 10,
        a if a > 10 => 5,
        _ => 0,
    }
}

fn weighted(count: usize, weight: u32) -> u32 {
    u32::try_from(count)
        .unwrap_or(u32::MAX)
        .saturating_mul(weight)
}

fn total(factors: &[RiskFactor]) -> RiskScore {
    let points = factors
        .iter()
        .fold(0u32, |acc, f| acc.saturating_add(f.points));
    RiskScore::from_points(points)
}

fn summary_factors(inputs: &ScoreInputs<'_>, current_year: i32) -> Vec<RiskFactor> {
    let mut factors = vec![RiskFactor {
        name: "Base".to_string(),
        points: BASE_POINTS,
        reason: "Baseline for every aircraft".to_string(),
    }];

    if let Some(year) = inputs.year {
        let age = current_year.saturating_sub(year);
        factors.push(RiskFactor {
            name: "Airframe Age".to_string(),
            points: age_points(age),
            reason: format!("Built {} ({} years)", year, age),
        });
    }

    let accidents = inputs.accidents.len();
    factors.push(RiskFactor {
        name: "Accident History".to_string(),
        points: weighted(accidents, ACCIDENT_POINTS),
        reason: format!("{} accident(s) on record", accidents),
    });

    let fatal = inputs.fatal_accidents();
    factors.push(RiskFactor {
        name: "Fatal Accidents".to_string(),
        points: weighted(fatal, FATAL_ACCIDENT_POINTS),
        reason: format!("{} accident(s) with fatalities", fatal),
    });

    let directives = inputs.directives.len();
    factors.push(RiskFactor {
        name: "Airworthiness Directives".to_string(),
        points: weighted(directives, DIRECTIVE_POINTS),
        reason: format!("{} applicable directive(s)", directives),
    });

    factors
}

fn owner_weighted_factors(inputs: &ScoreInputs<'_>) -> Vec<RiskFactor> {
    let open = inputs.open_directives();
    let accidents = inputs.accidents.len();
    let owners = inputs.owner_count.unwrap_or(0);

    vec![
        RiskFactor {
            name: "Open Directives".to_string(),
            points: weighted(open, 5),
            reason: format!("{} open directive(s)", open),
        },
        RiskFactor {
            name: "Accident History".to_string(),
            points: weighted(accidents, 20),
            reason: format!("{} accident(s) on record", accidents),
        },
        RiskFactor {
            name: "Ownership Changes".to_string(),
            points: owners.saturating_mul(2),
            reason: format!("{} owner(s) on record", owners),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DirectiveStatus;

    fn accidents(fatalities: &[Option<u32>]) -> Vec<AccidentRecord> {
        fatalities
            .iter()
            .map(|f| AccidentRecord::new("N123AB", *f))
            .collect()
    }

    fn directives(statuses: &[DirectiveStatus]) -> Vec<DirectiveRecord> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, s)| DirectiveRecord::new(&format!("2020-0{}-01", i), "CESSNA", "172", *s))
            .collect()
    }

    #[test]
    fn test_empty_inputs_score_base() {
        let scorer = RiskScorer::new();
        let score = scorer.score(&ScoreInputs::new(None, &[], &[]), 2025);
        assert_eq!(score.score(), 25);
    }

    #[test]
    fn test_old_aircraft_with_history_clamps() {
        let scorer = RiskScorer::new();
        let acc = accidents(&[Some(2), None]);
        let ads = directives(&[DirectiveStatus::Open; 3]);

        // 25 + 20 + 30 + 25 + 15 = 115
        let score = scorer.score(&ScoreInputs::new(Some(1990), &acc, &ads), 2025);
        assert_eq!(score.score(), 100);
    }

    #[test]
    fn test_age_bands() {
        assert_eq!(age_points(31), 20);
        assert_eq!(age_points(30), 10);
        assert_eq!(age_points(21), 10);
        assert_eq!(age_points(20), 5);
        assert_eq!(age_points(11), 5);
        assert_eq!(age_points(10), 0);
        assert_eq!(age_points(-3), 0);
    }

    #[test]
    fn test_summary_counts_all_directives() {
        let scorer = RiskScorer::new();
        let ads = directives(&[DirectiveStatus::Open, DirectiveStatus::Closed]);
        let score = scorer.score(&ScoreInputs::new(Some(2020), &[], &ads), 2025);
        assert_eq!(score.score(), 35);
    }

    #[test]
    fn test_zero_fatalities_not_fatal() {
        let scorer = RiskScorer::new();
        let acc = accidents(&[Some(0)]);
        let score = scorer.score(&ScoreInputs::new(None, &acc, &[]), 2025);
        assert_eq!(score.score(), 40);
    }

    #[test]
    fn test_owner_weighted_formula() {
        let scorer = RiskScorer::with_formula(RiskFormula::OwnerWeighted);
        let mut aircraft = AircraftRecord::new("N123AB", "CESSNA", "172", Some(1975));
        aircraft.owner_count = Some(4);
        let acc = accidents(&[Some(1)]);
        let ads = directives(&[DirectiveStatus::Open, DirectiveStatus::Closed]);

        // 5*1 + 20*1 + 2*4
        let score = scorer.score(&ScoreInputs::for_aircraft(&aircraft, &acc, &ads), 2025);
        assert_eq!(score.score(), 33);
    }

    #[test]
    fn test_assessment_breakdown() {
        let scorer = RiskScorer::new();
        let acc = accidents(&[None]);
        let ads = directives(&[DirectiveStatus::Open, DirectiveStatus::Closed]);
        let assessment = scorer.assess(&ScoreInputs::new(Some(2000), &acc, &ads), 2025);

        // 25 + 10 + 15 + 0 + 10
        assert_eq!(assessment.risk_score.score(), 60);
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        assert_eq!(assessment.open_directives, 1);
        assert_eq!(assessment.factors.len(), 5);
        let sum: u32 = assessment.factors.iter().map(|f| f.points).sum();
        assert_eq!(sum, 60);
    }

    #[test]
    fn test_formula_from_str() {
        assert_eq!("summary".parse::<RiskFormula>().unwrap(), RiskFormula::Summary);
        assert_eq!(
            " Owner_Weighted ".parse::<RiskFormula>().unwrap(),
            RiskFormula::OwnerWeighted
        );
        assert!("weighted".parse::<RiskFormula>().is_err());
    }
}
