// ============================================================================
// DEVICE.RS - Real-Time Output
// ============================================================================
//
// Opens a mono F32 playback device and lets its callback pull samples out of
// a RenderEngine. The callback thread only ever renders; all scheduling
// happens on other threads through the engine's AudioBackend methods.
//
// The device keeps running until the OutputDevice is dropped.
// ============================================================================

use miniaudio::{Device, DeviceConfig, DeviceType, Format};

use super::render::RenderEngine;

/// A running playback device fed by a render engine
pub struct OutputDevice {
    /// Held only to keep the stream alive; dropping it closes the device
    _device: Device,
    sample_rate: u32,
}

impl OutputDevice {
    /// Opens the default output device and starts it
    pub fn open(engine: RenderEngine, sample_rate: u32) -> anyhow::Result<Self> {
        let mut config = DeviceConfig::new(DeviceType::Playback);
        config.playback_mut().set_format(Format::F32);
        config.playback_mut().set_channels(1);
        config.set_sample_rate(sample_rate);

        config.set_data_callback(move |_device, output, _input| {
            let frames = output.as_samples_mut::<f32>();
            engine.render(frames);
        });

        let device = Device::new(None, &config)
            .map_err(|e| anyhow::anyhow!("Failed to create audio device: {:?}", e))?;

        device
            .start()
            .map_err(|e| anyhow::anyhow!("Failed to start audio device: {:?}", e))?;

        log::info!("audio device started at {} Hz, mono", sample_rate);

        Ok(Self { _device: device, sample_rate })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

