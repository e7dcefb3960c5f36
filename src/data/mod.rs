//! Data collaborators: sample encoding, feature scaling, the prepared dataset
//! and the synthetic panel generator.

pub mod dataset;
pub mod encoder;
pub mod sample;
pub mod scaler;

pub use dataset::{PreparedDataset, PreparedRow, clean_observations};
pub use encoder::SampleEncoder;
pub use sample::{Panel, PanelConfig, TrueCurve, dilution_series, generate_panel};
pub use scaler::{FeatureScaler, IdentityScaler, StandardScaler};
