use crate::error::{Result, ScheduleError};
use crate::job::TargetType;
use std::collections::HashMap;
use std::sync::Arc;

/// Placeholders that the executor substitutes with configured paths before a URL target runs.
pub const URL_PLACEHOLDERS: [&str; 2] = ["{apiPath}", "{webPath}"];

/// Capability of an in-process job target.
///
/// Class targets are never resolved by name at run time; an executor registers
/// each target it can run and jobs may only reference registered names.
pub trait CronTarget: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }
}

#[derive(Default, Clone)]
pub struct TargetRegistry {
    targets: HashMap<String, Arc<dyn CronTarget>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, target: Arc<dyn CronTarget>) {
        let name = target.name().trim().to_string();
        match target.description() {
            "" => log::debug!("Registered target {}", name),
            description => log::debug!("Registered target {}: {}", name, description),
        }
        if self.targets.insert(name.clone(), target).is_some() {
            log::warn!("Target {} registered twice, keeping the latest", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CronTarget>> {
        self.targets.get(name.trim()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.targets.keys().cloned().collect();
        names.sort();
        names
    }

    /// Checks that a job target can be handed to the executor.
    pub fn validate_target(&self, target_type: TargetType, target: &str) -> Result<()> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ScheduleError::InvalidTarget {
                target: target.to_string(),
                reason: "target is required".to_string(),
            });
        }

        match target_type {
            TargetType::Url => {
                let lower = target.to_ascii_lowercase();
                let valid = lower.starts_with("http://")
                    || lower.starts_with("https://")
                    || URL_PLACEHOLDERS.iter().any(|p| target.starts_with(p));
                if !valid {
                    return Err(ScheduleError::InvalidTarget {
                        target: target.to_string(),
                        reason: "expected an http(s) URL or a {apiPath}/{webPath} prefix"
                            .to_string(),
                    });
                }
                Ok(())
            }
            TargetType::Class => {
                if self.targets.contains_key(target) {
                    Ok(())
                } else {
                    Err(ScheduleError::UnknownTarget(target.to_string()))
                }
            }
        }
    }
}

impl std::fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetRegistry")
            .field("targets", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DailyReport;

    impl CronTarget for DailyReport {
        fn name(&self) -> &str {
            "reports.daily"
        }

        fn description(&self) -> &str {
            "Daily report mailer"
        }
    }

    fn registry() -> TargetRegistry {
        let mut registry = TargetRegistry::new();
        registry.register(Arc::new(DailyReport));
        registry
    }

    #[test]
    fn test_class_targets_must_be_registered() {
        let registry = registry();
        assert!(registry.validate_target(TargetType::Class, " reports.daily ").is_ok());
        assert_eq!(
            registry.validate_target(TargetType::Class, "reports.weekly"),
            Err(ScheduleError::UnknownTarget("reports.weekly".to_string()))
        );
        assert_eq!(registry.names(), vec!["reports.daily".to_string()]);
        let daily = registry.get("reports.daily").unwrap();
        assert_eq!(daily.description(), "Daily report mailer");
    }

    #[test]
    fn test_url_targets() {
        let registry = registry();
        assert!(registry.validate_target(TargetType::Url, "https://example.com/cron").is_ok());
        assert!(registry.validate_target(TargetType::Url, "{apiPath}/services/cleanup").is_ok());
        assert!(matches!(
            registry.validate_target(TargetType::Url, "ftp://example.com"),
            Err(ScheduleError::InvalidTarget { .. })
        ));
        assert!(matches!(
            registry.validate_target(TargetType::Url, "   "),
            Err(ScheduleError::InvalidTarget { .. })
        ));
    }
}
