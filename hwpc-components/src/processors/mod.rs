mod combustion;
mod landfill;
mod left_in_forest;
mod transformation;

pub use combustion::{CombustionParameters, CombustionProcessor};
pub use landfill::{LandfillParameters, LandfillProcessor};
pub use left_in_forest::{LeftInForestParameters, LeftInForestProcessor};
pub use transformation::{
    Extraction, ProductParameters, TransformationParameters, TransformationProcessor,
};
