//! Offline rendering of interleaved audio through an [`EffectChain`].

use std::{
    io::{Read, Seek, Write},
    path::Path,
};

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use stomp_dsp::{EffectChain, ProcessBlock, ProcessContext, Sample};
use tracing::{debug, info};

/// Interleaved audio held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Audio {
    pub sample_rate: u32,
    pub channels: usize,
    pub samples: Vec<Sample>,
}

impl Audio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }
}

pub fn read_wav(path: &Path) -> Result<Audio> {
    let reader = WavReader::open(path)
        .with_context(|| format!("failed to open `{}`", path.display()))?;
    decode(reader).with_context(|| format!("failed to decode `{}`", path.display()))
}

fn decode<R: Read>(reader: WavReader<R>) -> Result<Audio> {
    let spec = reader.spec();
    if spec.channels == 0 {
        bail!("WAV file declares zero channels");
    }
    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    debug!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        format = ?spec.sample_format,
        "decoded input"
    );
    Ok(Audio {
        sample_rate: spec.sample_rate,
        channels: spec.channels as usize,
        samples,
    })
}

pub fn write_wav(path: &Path, audio: &Audio) -> Result<()> {
    let writer = WavWriter::create(path, float_spec(audio))
        .with_context(|| format!("failed to create `{}`", path.display()))?;
    encode(writer, &audio.samples)
        .with_context(|| format!("failed to write `{}`", path.display()))
}

fn float_spec(audio: &Audio) -> WavSpec {
    WavSpec {
        channels: audio.channels as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

fn encode<W: Write + Seek>(mut writer: WavWriter<W>, samples: &[Sample]) -> Result<()> {
    for sample in samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Runs `audio` through `chain` in blocks of `block_size` frames.
///
/// The tail is zero-padded to a whole block. With `compensate_latency` the
/// chain is flushed with silence and its delay is trimmed from the front, so
/// output frame `n` lines up with input frame `n`.
pub fn render(
    chain: &mut EffectChain,
    audio: &Audio,
    block_size: usize,
    compensate_latency: bool,
) -> Vec<Sample> {
    let channels = audio.channels;
    let frames = audio.frames();
    let latency = if compensate_latency { chain.latency() } else { 0 };
    let total_frames = frames + latency;
    let blocks = total_frames.div_ceil(block_size);

    info!(
        frames,
        channels,
        block_size,
        latency = chain.latency(),
        "rendering"
    );

    let mut output = Vec::with_capacity(blocks * block_size * channels);
    let mut buffer = vec![0.0; block_size * channels];
    for index in 0..blocks {
        let start = (index * block_size * channels).min(audio.samples.len());
        let end = ((index + 1) * block_size * channels).min(audio.samples.len());
        let chunk = &audio.samples[start..end];
        buffer[..chunk.len()].copy_from_slice(chunk);
        buffer[chunk.len()..].fill(0.0);

        let context = ProcessContext {
            sample_rate: audio.sample_rate,
            channels,
            frame_count: block_size,
            time_since_start: (index * block_size) as f64 / audio.sample_rate as f64,
        };
        let mut block = ProcessBlock::new(&mut buffer, channels);
        chain.process(&mut block, &context);
        output.extend_from_slice(&buffer);
    }

    let skip = latency * channels;
    output.drain(..skip.min(output.len()));
    output.truncate(frames * channels);
    output
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use stomp_dsp::ParameterValue;
    use stomp_effects::{controls, EffectRegistry};

    use super::*;

    fn ramp(frames: usize, channels: usize) -> Audio {
        Audio {
            sample_rate: 48_000,
            channels,
            samples: (0..frames * channels)
                .map(|i| ((i % 97) as Sample / 97.0) - 0.5)
                .collect(),
        }
    }

    fn bypassed_formant(channels: usize, block_size: usize) -> EffectChain {
        let registry = EffectRegistry::with_builtin();
        let mut effect = registry
            .create("formant_shift", 48_000, channels, block_size)
            .unwrap();
        effect.update_parameter(ParameterValue {
            id: "bypass",
            value: 1.0,
        });
        effect.update_parameter(ParameterValue {
            id: "output_gain",
            value: controls::FORMANT_UNITY_GAIN,
        });
        let mut chain = EffectChain::new();
        chain.add_effect(effect);
        chain
    }

    #[test]
    fn empty_chain_passes_partial_blocks_through() {
        let audio = ramp(1_000, 2);
        let output = render(&mut EffectChain::new(), &audio, 128, true);
        assert_eq!(output, audio.samples);
    }

    #[test]
    fn latency_compensation_aligns_output_with_input() {
        let audio = ramp(2_000, 2);
        let mut chain = bypassed_formant(2, 64);
        let output = render(&mut chain, &audio, 64, true);
        assert_eq!(output.len(), audio.samples.len());
        for (n, (out, input)) in output.iter().zip(&audio.samples).enumerate() {
            assert!((out - input).abs() < 1e-4, "sample {n}: {out} vs {input}");
        }
    }

    #[test]
    fn uncompensated_output_is_delayed() {
        let audio = ramp(1_024, 1);
        let mut chain = bypassed_formant(1, 64);
        let output = render(&mut chain, &audio, 64, false);
        let latency = 3 * 64;
        assert_eq!(output.len(), audio.samples.len());
        assert!(output[..latency].iter().all(|x| x.abs() < 1e-5));
        assert!((output[latency + 10] - audio.samples[10]).abs() < 1e-4);
    }

    #[test]
    fn integer_wav_is_scaled_to_unit_range() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for value in [0_i16, 16_384, -32_768] {
                writer.write_sample(value).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.set_position(0);
        let audio = decode(WavReader::new(cursor).unwrap()).unwrap();
        assert_eq!(audio.sample_rate, 22_050);
        assert_eq!(audio.samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn float_output_keeps_samples_exactly() {
        let audio = ramp(10, 2);
        let mut cursor = Cursor::new(Vec::new());
        encode(WavWriter::new(&mut cursor, float_spec(&audio)).unwrap(), &audio.samples).unwrap();
        cursor.set_position(0);
        let decoded = decode(WavReader::new(cursor).unwrap()).unwrap();
        assert_eq!(decoded, audio);
    }
}
