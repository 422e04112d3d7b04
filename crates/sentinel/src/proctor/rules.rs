//! Detection rules applied to every proctoring frame.

use sentinel_common::constants::PERSON_LABEL;
use sentinel_common::{Alert, AlertKind, Detection};

use crate::config::ProctorConfig;

/// A stateless rule over one frame's object detections
pub trait FrameRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, detections: &[Detection]) -> Vec<Alert>;
}

/// One red flag per detected forbidden object
pub struct ContrabandRule {
    labels: Vec<String>,
}

impl ContrabandRule {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }
}

impl FrameRule for ContrabandRule {
    fn name(&self) -> &'static str {
        "contraband"
    }

    fn evaluate(&self, detections: &[Detection]) -> Vec<Alert> {
        detections
            .iter()
            .filter(|d| self.labels.iter().any(|l| *l == d.label))
            .map(|d| {
                Alert::new(
                    AlertKind::RedFlag,
                    format!("Unauthorized object detected: {}", d.label),
                )
            })
            .collect()
    }
}

/// One yellow flag when more people than allowed share the frame
pub struct MultiPersonRule {
    max_persons: u32,
}

impl MultiPersonRule {
    pub fn new(max_persons: u32) -> Self {
        Self { max_persons }
    }
}

impl FrameRule for MultiPersonRule {
    fn name(&self) -> &'static str {
        "multi_person"
    }

    fn evaluate(&self, detections: &[Detection]) -> Vec<Alert> {
        let persons = detections.iter().filter(|d| d.label == PERSON_LABEL).count();
        if persons > self.max_persons as usize {
            vec![Alert::new(
                AlertKind::YellowFlag,
                format!("Multiple persons in frame: {}", persons),
            )]
        } else {
            Vec::new()
        }
    }
}

/// Rules installed for this configuration. Person detections only matter
/// when `max_persons` is set.
pub fn build_rules(config: &ProctorConfig) -> Vec<Box<dyn FrameRule>> {
    let mut rules: Vec<Box<dyn FrameRule>> =
        vec![Box::new(ContrabandRule::new(config.contraband_labels.clone()))];

    if let Some(max_persons) = config.max_persons {
        rules.push(Box::new(MultiPersonRule::new(max_persons)));
    }

    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contraband() -> ContrabandRule {
        ContrabandRule::new(vec!["cell phone".to_string(), "book".to_string()])
    }

    #[test]
    fn test_contraband_one_alert_per_detection() {
        let alerts = contraband().evaluate(&[
            Detection::new("cell phone", 0.9),
            Detection::new("person", 0.99),
            Detection::new("book", 0.6),
            Detection::new("cell phone", 0.7),
        ]);
        assert_eq!(alerts.len(), 3);
        assert!(alerts.iter().all(|a| a.kind == AlertKind::RedFlag));
        assert_eq!(alerts[0].reason, "Unauthorized object detected: cell phone");
    }

    #[test]
    fn test_person_alone_is_not_flagged() {
        assert!(contraband().evaluate(&[Detection::new("person", 0.99)]).is_empty());
    }

    #[test]
    fn test_multi_person_rule() {
        let rule = MultiPersonRule::new(1);
        assert!(rule.evaluate(&[Detection::new("person", 0.9)]).is_empty());
        let alerts = rule.evaluate(&[Detection::new("person", 0.9), Detection::new("person", 0.8)]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::YellowFlag);
    }

    #[test]
    fn test_build_rules() {
        let mut config = ProctorConfig::default();
        let names: Vec<_> = build_rules(&config).iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["contraband"]);

        config.max_persons = Some(1);
        let names: Vec<_> = build_rules(&config).iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["contraband", "multi_person"]);
    }
}
