use std::fmt;

use crate::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Reference to an uploaded asset, carried as chat text in
/// `"<assetId>.<sizeKb>kb.<displayName>"` form.
///
/// The asset id ends at the first `.`, so ids must be dot-free; display names
/// may contain dots.
pub struct AssetReference {
    pub asset_id: String,
    pub size_kb: u64,
    pub display_name: String,
}

impl AssetReference {
    pub fn encode(&self) -> String {
        format!("{}.{}kb.{}", self.asset_id, self.size_kb, self.display_name)
    }

    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let invalid = |reason: &'static str| ProtocolError::InvalidAssetReference {
            raw: raw.to_string(),
            reason,
        };
        let (asset_id, rest) = raw
            .split_once('.')
            .ok_or_else(|| invalid("missing asset id separator"))?;
        if asset_id.trim().is_empty() {
            return Err(invalid("asset id must be non-empty"));
        }
        let (size, display_name) = rest
            .split_once("kb.")
            .ok_or_else(|| invalid("missing size suffix"))?;
        let size_kb = size
            .parse::<u64>()
            .map_err(|_| invalid("size must be an unsigned integer"))?;
        if display_name.is_empty() {
            return Err(invalid("display name must be non-empty"));
        }
        Ok(Self {
            asset_id: asset_id.to_string(),
            size_kb,
            display_name: display_name.to_string(),
        })
    }
}

impl fmt::Display for AssetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
