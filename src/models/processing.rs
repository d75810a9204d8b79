use garde::Validate;
use serde::Deserialize;
use strum::{Display, EnumString};

/// Default JPEG quality for the quality strategy and for resized output.
pub const DEFAULT_QUALITY: u8 = 85;

/// Default scale for the pixel strategy when no bounds are given.
pub const DEFAULT_PERCENTAGE: u32 = 80;

/// Largest side a JPEG can encode.
pub const MAX_BOUND: u32 = 65_535;

/// Strategy discriminator accepted on `POST /process/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ProcessingType {
    Quality,
    Pixel,
}

/// How the pixel strategy picks its target size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResizeMode {
    /// Scale both axes by this percentage of the original.
    Percentage(u32),
    /// Fit within explicit bounds.
    Bounds {
        max_width: Option<u32>,
        max_height: Option<u32>,
        preserve_aspect: bool,
    },
}

/// A fully resolved transformation, defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Quality { quality: u8 },
    Pixel { resize: ResizeMode, quality: u8 },
}

impl Strategy {
    pub fn kind(&self) -> ProcessingType {
        match self {
            Strategy::Quality { .. } => ProcessingType::Quality,
            Strategy::Pixel { .. } => ProcessingType::Pixel,
        }
    }
}

/// Body of `POST /process/{id}`.
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: ProcessOptions,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOptions {
    #[garde(range(min = 1, max = 100))]
    pub quality: Option<u32>,

    #[garde(range(min = 1, max = 100))]
    pub percentage: Option<u32>,

    #[garde(range(min = 1, max = MAX_BOUND))]
    pub max_width: Option<u32>,

    #[garde(range(min = 1, max = MAX_BOUND))]
    pub max_height: Option<u32>,

    #[garde(skip)]
    #[serde(default)]
    pub no_aspect: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid processing type: {0}")]
    InvalidType(String),

    #[error("Invalid processing options: {0}")]
    InvalidOptions(#[from] garde::Report),
}

impl ProcessRequest {
    /// Validate the request and resolve it into a [`Strategy`].
    pub fn into_strategy(self) -> Result<Strategy, RequestError> {
        let kind: ProcessingType = self
            .kind
            .parse()
            .map_err(|_| RequestError::InvalidType(self.kind.clone()))?;
        self.options.validate()?;

        let options = self.options;
        // Ranges are checked above, so the narrowing cannot truncate.
        let quality = options.quality.map_or(DEFAULT_QUALITY, |q| q as u8);

        Ok(match kind {
            ProcessingType::Quality => Strategy::Quality { quality },
            ProcessingType::Pixel => {
                let resize = if options.max_width.is_some() || options.max_height.is_some() {
                    ResizeMode::Bounds {
                        max_width: options.max_width,
                        max_height: options.max_height,
                        preserve_aspect: !options.no_aspect,
                    }
                } else {
                    ResizeMode::Percentage(options.percentage.unwrap_or(DEFAULT_PERCENTAGE))
                };
                Strategy::Pixel {
                    resize,
                    quality: DEFAULT_QUALITY,
                }
            }
        })
    }
}
