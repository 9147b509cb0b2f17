use std::env;
use std::sync::OnceLock;

/// Default alignment, in bytes, of device buffers and scratchpad regions.
pub const DEFAULT_BUFFER_ALIGNMENT: usize = 128;

static GLOBAL_CONFIG: OnceLock<EngineConfig> = OnceLock::new();

/// Runtime knobs read from the environment.
///
/// - `QD_KERNEL_CACHE`: reuse compiled kernels across identical kernel contexts (default on)
/// - `QD_VERBOSE`: log every primitive creation and execution at info level (default off)
/// - `QD_BUFFER_ALIGNMENT`: device buffer alignment in bytes, a power of two (default 128)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub kernel_cache: bool,
    pub verbose: bool,
    pub buffer_alignment: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            kernel_cache: true,
            verbose: false,
            buffer_alignment: DEFAULT_BUFFER_ALIGNMENT,
        }
    }
}

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

impl EngineConfig {
    /// Process-wide configuration, read from the environment once.
    pub fn global() -> &'static EngineConfig {
        GLOBAL_CONFIG.get_or_init(EngineConfig::from_env)
    }

    pub fn from_env() -> Self {
        EngineConfig::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unset or blank keys
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = EngineConfig::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = get("QD_KERNEL_CACHE") {
            config.kernel_cache = parse_bool(&value);
        }
        if let Some(value) = get("QD_VERBOSE") {
            config.verbose = parse_bool(&value);
        }
        if let Some(value) = get("QD_BUFFER_ALIGNMENT") {
            match value.trim().parse::<usize>() {
                Ok(align) if align.is_power_of_two() => config.buffer_alignment = align,
                _ => log::warn!(
                    "ignoring QD_BUFFER_ALIGNMENT={:?}: not a power of two, using {}",
                    value,
                    DEFAULT_BUFFER_ALIGNMENT
                ),
            }
        }
        config
    }
}
