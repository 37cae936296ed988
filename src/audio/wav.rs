use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Diagnostic WAV dump of captured session audio
///
/// Writes 16-bit mono PCM as it flows through the capture pipeline.
/// Finalized explicitly or on drop.
pub struct WavDump {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    path: PathBuf,
    sample_count: usize,
}

impl WavDump {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create dump directory")?;
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV dump: {:?}", path))?;

        info!("Capture dump enabled: {}", path.display());

        Ok(Self {
            writer: Some(writer),
            path,
            sample_count: 0,
        })
    }

    pub fn write_samples(&mut self, samples: &[i16]) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV dump")?;
            }
            self.sample_count += samples.len();
        }

        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV dump")?;
            info!(
                "Capture dump complete: {} ({} samples)",
                self.path.display(),
                self.sample_count
            );
        }

        Ok(())
    }
}

impl Drop for WavDump {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV dump on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_writes_readable_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.wav");

        let mut dump = WavDump::create(&path, 16000).unwrap();
        dump.write_samples(&[100, -200, 300]).unwrap();
        dump.write_samples(&[-400, 500]).unwrap();
        dump.finish().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);

        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![100, -200, 300, -400, 500]);
    }

    #[test]
    fn test_dump_finalizes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.wav");

        {
            let mut dump = WavDump::create(&path, 16000).unwrap();
            dump.write_samples(&[1, 2, 3]).unwrap();
        }

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 3);
    }
}
