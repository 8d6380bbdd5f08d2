//! Sequenced FITS files.
//!
//! Each exposure becomes `<prefix>_<kind>_<NNNNNN>.fits`: a 16-bit
//! unsigned primary image carrying the DATE, INSTRUME, EXPTIME, NFRAME,
//! GAIN and IMTYPE keywords. A PNG preview with the same stem can be
//! written alongside.

use super::camera::InstrumentError;
use super::exposure::{Exposure, ExposureKind};
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use std::path::{Path, PathBuf};

/// Writes exposures to a directory under increasing sequence numbers.
#[derive(Debug, Clone)]
pub struct ExposureWriter {
    directory: PathBuf,
    prefix: String,
    exposure_id: u32,
    preview: bool,
}

/// Paths produced by [`ExposureWriter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenExposure {
    /// FITS image.
    pub fits: PathBuf,
    /// PNG preview, when enabled.
    pub preview: Option<PathBuf>,
}

impl ExposureWriter {
    /// Creates a writer; the directory is created on first write.
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            exposure_id: 0,
            preview: false,
        }
    }

    /// Continues numbering after `last_id`.
    pub fn starting_after(mut self, last_id: u32) -> Self {
        self.exposure_id = last_id;
        self
    }

    /// Also writes a 16-bit PNG next to each FITS file.
    pub fn with_preview(mut self, enabled: bool) -> Self {
        self.preview = enabled;
        self
    }

    /// Sequence number of the last file written.
    pub fn last_id(&self) -> u32 {
        self.exposure_id
    }

    /// Output directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn stem(&self, kind: ExposureKind, id: u32) -> String {
        format!("{}_{}_{:06}", self.prefix, kind, id)
    }

    /// Writes the exposure, replacing any file already at that name.
    pub fn write(&mut self, exposure: &Exposure) -> Result<WrittenExposure, InstrumentError> {
        std::fs::create_dir_all(&self.directory).map_err(|source| InstrumentError::Io {
            path: self.directory.clone(),
            source,
        })?;

        let id = self.exposure_id + 1;
        let stem = self.stem(exposure.kind, id);
        let fits_path = self.directory.join(format!("{stem}.fits"));
        write_fits(&fits_path, exposure)?;

        let preview = if self.preview {
            let path = self.directory.join(format!("{stem}.png"));
            let buffer = exposure.image.to_luma16().ok_or(InstrumentError::Geometry)?;
            buffer.save(&path)?;
            Some(path)
        } else {
            None
        };

        self.exposure_id = id;
        tracing::info!(
            path = %fits_path.display(),
            kind = %exposure.kind,
            nframe = exposure.nframe,
            "Wrote exposure"
        );

        Ok(WrittenExposure {
            fits: fits_path,
            preview,
        })
    }
}

fn write_fits(path: &Path, exposure: &Exposure) -> Result<(), InstrumentError> {
    let image = &exposure.image;
    let description = ImageDescription {
        data_type: ImageType::UnsignedShort,
        dimensions: &[image.height(), image.width()],
    };

    let mut file = FitsFile::create(path)
        .with_custom_primary(&description)
        .overwrite()
        .open()?;
    let hdu = file.primary_hdu()?;
    hdu.write_image(&mut file, image.pixels())?;

    let header = exposure.header();
    hdu.write_key(&mut file, "DATE", header.date)?;
    hdu.write_key(&mut file, "INSTRUME", header.instrument)?;
    hdu.write_key(&mut file, "EXPTIME", header.exptime)?;
    hdu.write_key(&mut file, "NFRAME", header.nframe as i64)?;
    hdu.write_key(&mut file, "GAIN", header.gain)?;
    hdu.write_key(&mut file, "IMTYPE", header.imtype.as_str().to_string())?;
    Ok(())
}
