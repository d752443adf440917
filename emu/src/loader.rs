use std::fs;
use std::path::Path;

use arch::image;

use crate::error::LoadError;

/// Read an image and validate its header and export table.
pub fn load(path: &Path) -> Result<Vec<u8>, LoadError> {
    let bytes = fs::read(path).map_err(|e| LoadError::Open(path.display().to_string(), e))?;
    image::check(&bytes)?;
    tracing::debug!("loaded {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

/// Header of the embedded map found through the `mapdata` export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapInfo {
    pub addr: u32,
    pub width: u16,
    pub height: u16,
}

impl MapInfo {
    /// First tile byte.
    pub fn data(&self) -> u32 {
        self.addr + 4
    }

    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn map_info(image: &[u8]) -> Result<Option<MapInfo>, LoadError> {
    let Some(addr) = image::find_export(image, "mapdata")? else {
        return Ok(None);
    };
    let at = addr as usize;
    let header = match image.get(at..at.saturating_add(4)) {
        Some(header) => header,
        None => return Ok(None),
    };
    Ok(Some(MapInfo {
        addr,
        width: u16::from_le_bytes([header[0], header[1]]),
        height: u16::from_le_bytes([header[2], header[3]]),
    }))
}
