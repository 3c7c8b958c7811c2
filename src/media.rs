//! Technical metadata checks for image and audio files
//!
//! Files with an extension in [`MEDIA_EXTENSIONS`] are probed for a handful of
//! technical metadata fields and checked against two rules:
//!
//! 1. The file's extension must be one of the extensions its detected format
//!    is known by.
//! 2. Audio must be sampled above 44.1 kHz.
//!
//! A failed rule is not an error; it adds a human-readable reason to the
//! record's validation list. Only a probe that cannot run, or a field that
//! cannot be interpreted, is an error, and the runner records it as a failed
//! processing stage.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, warn};

/// Extensions of files that get technical metadata validation
pub const MEDIA_EXTENSIONS: [&str; 6] = ["jpg", "jp2", "tif", "tiff", "wav", "mov"];

/// Extensions whose sampling rate is checked
pub const AUDIO_EXTENSIONS: [&str; 1] = ["wav"];

/// Probe fields the validator reads
pub const PROBE_FIELDS: [&str; 5] = [
    "FileExtension",
    "InternetMediaType",
    "Format/Extensions",
    "Compression_Mode",
    "SamplingRate",
];

/// Lowest sampling rate that is rejected
pub const MIN_SAMPLING_RATE: f64 = 44_100.0;

/// Reason recorded when the extension does not fit the detected format
pub const EXTENSION_MISMATCH: &str = "File extension not expected value.";

/// Reason recorded for audio at or below the sampling-rate floor
pub const LOW_SAMPLING_RATE: &str = "Sampling rate is incorrect.";

/// Failure while probing or interpreting media metadata
#[derive(Debug, Error)]
pub enum MediaError {
    /// The probe could not be run or returned an error
    #[error("probe failed for {path:?}: {reason}")]
    Probe {
        /// Probed file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// A field had a value the rules cannot interpret
    #[error("field {field} has unusable value '{value}'")]
    InvalidField {
        /// Field name
        field: String,
        /// Raw value
        value: String,
    },
}

/// Technical metadata fields reported by a probe
///
/// Fields the probe did not report read as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaFields(BTreeMap<String, String>);

impl MediaFields {
    /// Create an empty field set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, trimming surrounding whitespace
    pub fn with(mut self, field: &str, value: &str) -> Self {
        self.insert(field, value);
        self
    }

    /// Set a field, trimming surrounding whitespace
    pub fn insert(&mut self, field: &str, value: &str) {
        self.0.insert(field.trim().to_string(), value.trim().to_string());
    }

    /// Value of `field`, empty when absent
    pub fn get(&self, field: &str) -> &str {
        self.0.get(field).map(String::as_str).unwrap_or("")
    }

    /// Keep only the fields the validator reads
    pub fn retain_probe_fields(mut self) -> Self {
        self.0.retain(|k, _| PROBE_FIELDS.contains(&k.as_str()));
        self
    }
}

/// Reads technical metadata from a file
pub trait MediaProbe {
    /// Probe `path` for its technical metadata
    fn probe(&self, path: &Path) -> Result<MediaFields, MediaError>;
}

impl<F> MediaProbe for F
where
    F: Fn(&Path) -> Result<MediaFields, MediaError>,
{
    fn probe(&self, path: &Path) -> Result<MediaFields, MediaError> {
        self(path)
    }
}

/// Probe backed by the `mediainfo` command-line tool
#[derive(Debug, Clone)]
pub struct MediaInfoProbe {
    program: String,
}

impl Default for MediaInfoProbe {
    fn default() -> Self {
        Self {
            program: "mediainfo".to_string(),
        }
    }
}

impl MediaInfoProbe {
    /// Use a specific `mediainfo` executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MediaProbe for MediaInfoProbe {
    fn probe(&self, path: &Path) -> Result<MediaFields, MediaError> {
        let output = Command::new(&self.program)
            .arg("-f")
            .arg("--Language=raw")
            .arg(path)
            .output()
            .map_err(|e| MediaError::Probe {
                path: path.to_path_buf(),
                reason: format!("cannot run {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(MediaError::Probe {
                path: path.to_path_buf(),
                reason: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(parse_mediainfo_output(&String::from_utf8_lossy(&output.stdout)).retain_probe_fields())
    }
}

/// Parse `mediainfo -f --Language=raw` output
///
/// Lines look like `SamplingRate          : 48000`. Section headers carry no
/// colon and are skipped; when a field appears in several sections the last
/// one wins.
pub fn parse_mediainfo_output(output: &str) -> MediaFields {
    let mut fields = MediaFields::new();
    for line in output.lines() {
        if let Some((field, value)) = line.split_once(':') {
            let field = field.trim();
            if !field.is_empty() {
                fields.insert(field, value);
            }
        }
    }
    fields
}

/// Whether `file_name` gets media validation
pub fn applies_to(file_name: &str) -> bool {
    crate::utils::extension_of(file_name)
        .is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
}

/// Check probe fields against the media rules
///
/// Returns the reasons for every failed rule, in rule order; an empty list
/// means the file passed.
pub fn validate_fields(file_name: &str, fields: &MediaFields) -> Result<Vec<String>, MediaError> {
    let mut reasons = Vec::new();

    let extension = fields.get("FileExtension");
    if !extension.is_empty() {
        let expected = fields
            .get("Format/Extensions")
            .split_whitespace()
            .any(|known| known.eq_ignore_ascii_case(extension));
        if !expected {
            reasons.push(EXTENSION_MISMATCH.to_string());
        }
    }

    if is_audio(file_name, fields) {
        let raw = fields.get("SamplingRate");
        if !raw.is_empty() {
            let rate = parse_sampling_rate(raw).ok_or_else(|| MediaError::InvalidField {
                field: "SamplingRate".to_string(),
                value: raw.to_string(),
            })?;
            if rate <= MIN_SAMPLING_RATE {
                reasons.push(LOW_SAMPLING_RATE.to_string());
            }
        }
    }

    Ok(reasons)
}

/// Probe `path` and validate the result
pub fn validate_file(
    probe: &dyn MediaProbe,
    path: &Path,
    file_name: &str,
) -> Result<Vec<String>, MediaError> {
    let fields = probe.probe(path)?;
    debug!("Media fields for {:?}: {:?}", path, fields);
    let reasons = validate_fields(file_name, &fields)?;
    for reason in &reasons {
        warn!("Media check failed for {:?}: {}", path, reason);
    }
    Ok(reasons)
}

fn is_audio(file_name: &str, fields: &MediaFields) -> bool {
    let by_extension = crate::utils::extension_of(file_name)
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()));
    by_extension || fields.get("InternetMediaType").starts_with("audio/")
}

/// First number in a sampling-rate value such as `48000` or `44100 / 22050`
fn parse_sampling_rate(raw: &str) -> Option<f64> {
    raw.split(|c: char| c == '/' || c.is_whitespace())
        .find(|part| !part.is_empty())
        .and_then(|part| part.parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIFF_OUTPUT: &str = "General\n\
        Count                                    : 331\n\
        FileExtension                            : tif\n\
        Format/Extensions                        : tiff tif\n\
        InternetMediaType                        : image/tiff\n\
        \n\
        Image\n\
        Compression_Mode                         : Lossless\n";

    #[test]
    fn test_parse_mediainfo_output() {
        let fields = parse_mediainfo_output(TIFF_OUTPUT).retain_probe_fields();
        assert_eq!(fields.get("FileExtension"), "tif");
        assert_eq!(fields.get("Format/Extensions"), "tiff tif");
        assert_eq!(fields.get("Compression_Mode"), "Lossless");
        assert_eq!(fields.get("SamplingRate"), "");
        assert_eq!(fields.get("Count"), "");
    }

    #[test]
    fn test_applies_to_media_extensions() {
        assert!(applies_to("scan.TIFF"));
        assert!(applies_to("take.wav"));
        assert!(!applies_to("notes.txt"));
        assert!(!applies_to("motif"));
    }

    #[test]
    fn test_extension_rule() {
        let ok = MediaFields::new()
            .with("FileExtension", "tif")
            .with("Format/Extensions", "tiff tif");
        assert!(validate_fields("scan.tif", &ok).unwrap().is_empty());

        let renamed = MediaFields::new()
            .with("FileExtension", "tif")
            .with("Format/Extensions", "jpeg jpg jpe");
        assert_eq!(
            validate_fields("scan.tif", &renamed).unwrap(),
            vec![EXTENSION_MISMATCH.to_string()]
        );
    }

    #[test]
    fn test_sampling_rate_rule_only_for_audio() {
        let low = MediaFields::new()
            .with("FileExtension", "wav")
            .with("Format/Extensions", "wav")
            .with("SamplingRate", "44100");
        assert_eq!(
            validate_fields("take.wav", &low).unwrap(),
            vec![LOW_SAMPLING_RATE.to_string()]
        );

        let high = low.clone().with("SamplingRate", "96000");
        assert!(validate_fields("take.wav", &high).unwrap().is_empty());

        // A video container with an audio track is not held to the audio floor
        let video = MediaFields::new()
            .with("FileExtension", "mov")
            .with("Format/Extensions", "mov qt")
            .with("InternetMediaType", "video/quicktime")
            .with("SamplingRate", "22050");
        assert!(validate_fields("clip.mov", &video).unwrap().is_empty());
    }

    #[test]
    fn test_both_rules_and_bad_value() {
        let both = MediaFields::new()
            .with("FileExtension", "wav")
            .with("Format/Extensions", "aiff aif")
            .with("SamplingRate", "22050 / 11025");
        assert_eq!(
            validate_fields("take.wav", &both).unwrap(),
            vec![EXTENSION_MISMATCH.to_string(), LOW_SAMPLING_RATE.to_string()]
        );

        let garbage = MediaFields::new().with("SamplingRate", "fast");
        let err = validate_fields("take.wav", &garbage).unwrap_err();
        assert!(matches!(err, MediaError::InvalidField { .. }));
    }

    #[test]
    fn test_validate_file_with_closure_probe() {
        let probe = |_: &Path| -> Result<MediaFields, MediaError> {
            Ok(MediaFields::new()
                .with("FileExtension", "jpg")
                .with("Format/Extensions", "tiff tif"))
        };
        let reasons = validate_file(&probe, Path::new("/data/a.jpg"), "a.jpg").unwrap();
        assert_eq!(reasons.len(), 1);
    }
}
