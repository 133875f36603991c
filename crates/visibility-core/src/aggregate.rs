//! Reduction of correlated records into visibility counters.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::model::{AssetType, ResponseRecord, VisibilityState};

/// Entry and byte counters split across the three visibility buckets.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityStats {
    pub total_entries: u64,
    pub total_bytes: u64,
    pub visible_entries: u64,
    pub visible_bytes: u64,
    pub no_tao_entries: u64,
    pub no_tao_bytes: u64,
    pub missing_entries: u64,
    pub missing_bytes: u64,
}

impl VisibilityStats {
    /// Count every record matching `filter` (all records when `None`).
    /// Records without an asset type only ever count toward the unfiltered run.
    pub fn aggregate(
        records: &[ResponseRecord],
        filter: Option<AssetType>,
    ) -> Result<Self, AnalysisError> {
        let mut stats = Self::default();
        for record in records {
            if let Some(asset) = filter {
                if record.asset_type != Some(asset) {
                    continue;
                }
            }
            let state = record
                .visibility_state
                .ok_or_else(|| AnalysisError::Uncorrelated {
                    url: record.url.clone(),
                })?;
            stats.record(state, record.transfer_size);
        }
        Ok(stats)
    }

    pub fn record(&mut self, state: VisibilityState, bytes: u64) {
        self.total_entries += 1;
        self.total_bytes += bytes;
        match state {
            VisibilityState::Visible => {
                self.visible_entries += 1;
                self.visible_bytes += bytes;
            }
            VisibilityState::Restricted => {
                self.no_tao_entries += 1;
                self.no_tao_bytes += bytes;
            }
            VisibilityState::Missing => {
                self.missing_entries += 1;
                self.missing_bytes += bytes;
            }
        }
    }

    /// Totals equal the sum of the three buckets, for entries and for bytes.
    pub fn is_balanced(&self) -> bool {
        self.total_entries == self.visible_entries + self.no_tao_entries + self.missing_entries
            && self.total_bytes == self.visible_bytes + self.no_tao_bytes + self.missing_bytes
    }
}

impl AddAssign for VisibilityStats {
    fn add_assign(&mut self, rhs: Self) {
        self.total_entries += rhs.total_entries;
        self.total_bytes += rhs.total_bytes;
        self.visible_entries += rhs.visible_entries;
        self.visible_bytes += rhs.visible_bytes;
        self.no_tao_entries += rhs.no_tao_entries;
        self.no_tao_bytes += rhs.no_tao_bytes;
        self.missing_entries += rhs.missing_entries;
        self.missing_bytes += rhs.missing_bytes;
    }
}

impl Add for VisibilityStats {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

/// One `VisibilityStats` per known asset type, serialized under the report keys.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub javascripts: VisibilityStats,
    pub css: VisibilityStats,
    pub images: VisibilityStats,
    pub xhrs: VisibilityStats,
    pub fonts: VisibilityStats,
    pub videos: VisibilityStats,
    pub audios: VisibilityStats,
    pub pixels: VisibilityStats,
    pub html: VisibilityStats,
}

impl CategoryBreakdown {
    /// Run the aggregator once per known category.
    pub fn aggregate(records: &[ResponseRecord]) -> Result<Self, AnalysisError> {
        let mut breakdown = Self::default();
        for asset in AssetType::ALL {
            *breakdown.get_mut(asset) = VisibilityStats::aggregate(records, Some(asset))?;
        }
        Ok(breakdown)
    }

    pub fn get(&self, asset: AssetType) -> &VisibilityStats {
        match asset {
            AssetType::Javascript => &self.javascripts,
            AssetType::Css => &self.css,
            AssetType::Image => &self.images,
            AssetType::Xhr => &self.xhrs,
            AssetType::Font => &self.fonts,
            AssetType::Video => &self.videos,
            AssetType::Audio => &self.audios,
            AssetType::Pixel => &self.pixels,
            AssetType::Html => &self.html,
        }
    }

    pub fn get_mut(&mut self, asset: AssetType) -> &mut VisibilityStats {
        match asset {
            AssetType::Javascript => &mut self.javascripts,
            AssetType::Css => &mut self.css,
            AssetType::Image => &mut self.images,
            AssetType::Xhr => &mut self.xhrs,
            AssetType::Font => &mut self.fonts,
            AssetType::Video => &mut self.videos,
            AssetType::Audio => &mut self.audios,
            AssetType::Pixel => &mut self.pixels,
            AssetType::Html => &mut self.html,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetType, &VisibilityStats)> + '_ {
        AssetType::ALL.into_iter().map(move |asset| (asset, self.get(asset)))
    }

    /// Sum over all categories; excludes records without an asset type.
    pub fn total(&self) -> VisibilityStats {
        self.iter()
            .fold(VisibilityStats::default(), |acc, (_, stats)| acc + *stats)
    }
}
