use crate::amounts::Element;
use thiserror::Error;

/// Error type for invalid configurations and failed simulations.
#[derive(Error, Debug)]
pub enum HwpcError {
    #[error("{0}")]
    Error(String),
    #[error("Unknown production line '{0}'")]
    UnknownProductionLine(String),
    #[error("Processor '{from}' links to '{to}' which is not defined")]
    UnknownProcessor { from: String, to: String },
    #[error("No processor named '{0}'")]
    NoSuchProcessor(String),
    #[error("Processor '{0}' is defined more than once")]
    DuplicateProcessor(String),
    #[error("Production line '{0}' is defined more than once")]
    DuplicateProductionLine(String),
    #[error("Processor '{processor}' has {parameter}={value}, expected a value within [0, 1]")]
    InvalidFactor {
        processor: String,
        parameter: String,
        value: f64,
    },
    #[error("Processor '{processor}' is misconfigured: {reason}")]
    InvalidProcessor { processor: String, reason: String },
    #[error("The transformation links of the production lines form a cycle through '{0}'. Only end-of-life links may loop back.")]
    CyclicProductionLine(String),
    #[error("Unknown distribution type '{0}'. Expected 'Uniform' or 'Gaussian'")]
    UnknownDistribution(String),
    #[error("Mass balance violated in processor '{processor}' for {element}: input={input}, output={output}")]
    MassBalance {
        processor: String,
        element: Element,
        input: f64,
        output: f64,
    },
    #[error("No properties defined for species '{0}'")]
    UnknownSpecies(String),
    #[error("Invalid reference table: {0}")]
    ReferenceTable(String),
    #[error("Dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// Convenience type for `Result<T, HwpcError>`.
pub type HwpcResult<T> = Result<T, HwpcError>;
