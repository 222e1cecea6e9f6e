//! Quality tiers and the downgrade negotiation policy.

use crate::catalog::StreamInfo;
use crate::error::Error;

/// The discrete audio fidelity levels offered by the catalog service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    /// 320 kbps MP3.
    Mp3,
    /// Lossless 16 bit / 44.1 kHz.
    Cd,
    /// Hi-res 24 bit up to 96 kHz.
    HiRes96,
    /// Hi-res 24 bit above 96 kHz.
    HiRes192,
}

impl QualityTier {
    /// The numeric format id used on the wire.
    pub fn format_id(self) -> u32 {
        match self {
            QualityTier::Mp3 => 5,
            QualityTier::Cd => 6,
            QualityTier::HiRes96 => 7,
            QualityTier::HiRes192 => 27,
        }
    }

    pub fn from_format_id(format_id: u32) -> Result<Self, Error> {
        match format_id {
            5 => Ok(QualityTier::Mp3),
            6 => Ok(QualityTier::Cd),
            7 => Ok(QualityTier::HiRes96),
            27 => Ok(QualityTier::HiRes192),
            other => Err(Error::InvalidQuality(other)),
        }
    }

    /// File extension of the container this tier is delivered in.
    pub fn extension(self) -> &'static str {
        match self {
            QualityTier::Mp3 => ".mp3",
            _ => ".flac",
        }
    }

    pub fn is_lossless(self) -> bool {
        !matches!(self, QualityTier::Mp3)
    }

    pub fn describe(self) -> &'static str {
        match self {
            QualityTier::Mp3 => "320kbps MP3",
            QualityTier::Cd => "16bit/44.1kHz",
            QualityTier::HiRes96 => "24bit/<=96kHz",
            QualityTier::HiRes192 => "24bit/>96kHz",
        }
    }
}

/// Outcome of negotiating a requested tier against what the server offers.
#[derive(Debug, Clone, PartialEq)]
pub enum Negotiation {
    Proceed {
        tier: QualityTier,
        bit_depth: Option<u32>,
        sampling_rate: Option<f64>,
    },
    Skip {
        reason: String,
    },
}

/// Decides whether to download with the achieved quality or skip the item.
///
/// Demo clips are always skipped. A server-side downgrade (`restricted`) is
/// accepted only when fallback is allowed; the achieved bit depth and sampling
/// rate then drive both the file extension and the name templates.
pub fn negotiate(requested: QualityTier, info: &StreamInfo, fallback_allowed: bool) -> Negotiation {
    if info.sample || info.sampling_rate.is_none() {
        return Negotiation::Skip {
            reason: "demo/preview clip".to_string(),
        };
    }
    if info.url.is_none() {
        return Negotiation::Skip {
            reason: "no stream url offered".to_string(),
        };
    }
    if info.restricted && !fallback_allowed {
        return Negotiation::Skip {
            reason: format!(
                "requested quality ({}) not available and fallback is disabled",
                requested.describe()
            ),
        };
    }
    Negotiation::Proceed {
        tier: requested,
        bit_depth: info.bit_depth,
        sampling_rate: info.sampling_rate,
    }
}
