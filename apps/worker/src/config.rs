use std::time::Duration;

use refdata_application::{RightAssignmentConfig, WorkerPoolConfig};
use refdata_core::{AppError, AppResult};
use refdata_domain::ProgramScope;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub right_assignment: RightAssignmentConfig,
    pub rebuild_interval: Option<Duration>,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let env = EnvLookup { lookup };

        let database_url = env.required("DATABASE_URL")?;
        let database_max_connections = env.parse_positive("DATABASE_MAX_CONNECTIONS", 10_u32)?;
        let batch_size = env.parse_positive("RIGHT_ASSIGNMENT_BATCH_SIZE", 5000_usize)?;
        let partition_size = env.parse_positive("RIGHT_ASSIGNMENT_PARTITION_SIZE", 250_usize)?;
        let core_pool_size = env.parse_positive("RIGHT_ASSIGNMENT_CORE_POOL_SIZE", 2_usize)?;
        let max_pool_size = env.parse_positive("RIGHT_ASSIGNMENT_MAX_POOL_SIZE", 4_usize)?;
        let queue_capacity = env.parse_positive("RIGHT_ASSIGNMENT_QUEUE_CAPACITY", 32_usize)?;
        let keep_alive_seconds =
            env.parse_positive("RIGHT_ASSIGNMENT_KEEP_ALIVE_SECONDS", 60_u64)?;
        let program_scope = match env.optional("RIGHT_ASSIGNMENT_PROGRAM_SCOPE") {
            Some(value) => value.parse::<ProgramScope>().map_err(|error| {
                AppError::Validation(format!(
                    "invalid RIGHT_ASSIGNMENT_PROGRAM_SCOPE value '{value}': {error}"
                ))
            })?,
            None => ProgramScope::default(),
        };
        let rebuild_interval = match env.optional("RIGHT_ASSIGNMENT_REBUILD_INTERVAL_SECONDS") {
            Some(_) => Some(Duration::from_secs(
                env.parse_positive("RIGHT_ASSIGNMENT_REBUILD_INTERVAL_SECONDS", 0_u64)?,
            )),
            None => None,
        };

        let worker_pool = WorkerPoolConfig::new(
            core_pool_size,
            max_pool_size,
            queue_capacity,
            Duration::from_secs(keep_alive_seconds),
        )?;
        let right_assignment =
            RightAssignmentConfig::new(batch_size, partition_size, program_scope, worker_pool)?;

        Ok(Self {
            database_url,
            database_max_connections,
            right_assignment,
            rebuild_interval,
        })
    }
}

struct EnvLookup<F> {
    lookup: F,
}

impl<F> EnvLookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &str) -> AppResult<String> {
        self.optional(name)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))
    }

    fn parse_positive<T>(&self, name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr + PartialEq + Default,
        T::Err: std::fmt::Display,
    {
        let Some(value) = self.optional(name) else {
            return Ok(default);
        };

        let parsed = value.parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        })?;
        if parsed == T::default() {
            return Err(AppError::Validation(format!(
                "{name} must be greater than zero"
            )));
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use refdata_core::AppError;
    use refdata_domain::ProgramScope;

    use super::WorkerConfig;

    fn load(pairs: &[(&str, &str)]) -> Result<WorkerConfig, AppError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        WorkerConfig::from_lookup(|name| values.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/refdata")])
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.right_assignment.batch_size(), 5000);
        assert_eq!(config.right_assignment.partition_size(), 250);
        assert_eq!(config.right_assignment.worker_pool().core_pool_size(), 2);
        assert_eq!(config.right_assignment.worker_pool().max_pool_size(), 4);
        assert_eq!(config.right_assignment.worker_pool().queue_capacity(), 32);
        assert_eq!(
            config.right_assignment.worker_pool().keep_alive(),
            Duration::from_secs(60)
        );
        assert_eq!(
            config.right_assignment.program_scope(),
            ProgramScope::Unrestricted
        );
        assert_eq!(config.rebuild_interval, None);
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(load(&[]), Err(AppError::Validation(_))));
    }

    #[test]
    fn zero_and_inconsistent_values_are_rejected() {
        let url = ("DATABASE_URL", "postgres://localhost/refdata");

        assert!(load(&[url, ("RIGHT_ASSIGNMENT_BATCH_SIZE", "0")]).is_err());
        assert!(load(&[url, ("RIGHT_ASSIGNMENT_REBUILD_INTERVAL_SECONDS", "0")]).is_err());
        assert!(load(&[url, ("RIGHT_ASSIGNMENT_PARTITION_SIZE", "many")]).is_err());
        assert!(
            load(&[
                url,
                ("RIGHT_ASSIGNMENT_CORE_POOL_SIZE", "8"),
                ("RIGHT_ASSIGNMENT_MAX_POOL_SIZE", "2"),
            ])
            .is_err()
        );
        assert!(load(&[url, ("RIGHT_ASSIGNMENT_PROGRAM_SCOPE", "everything")]).is_err());
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/refdata"),
            ("RIGHT_ASSIGNMENT_PROGRAM_SCOPE", "supported_only"),
            ("RIGHT_ASSIGNMENT_REBUILD_INTERVAL_SECONDS", "900"),
            ("RIGHT_ASSIGNMENT_BATCH_SIZE", "1000"),
        ])
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(
            config.right_assignment.program_scope(),
            ProgramScope::SupportedOnly
        );
        assert_eq!(config.rebuild_interval, Some(Duration::from_secs(900)));
        assert_eq!(config.right_assignment.batch_size(), 1000);
    }
}
