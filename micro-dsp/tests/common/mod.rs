use micro_dsp::Calibration;

/// Sine that completes `cycles` periods over `len` samples, as 12-bit ADC readings.
pub fn adc_sine(cycles: usize, amplitude: f32, len: usize) -> Vec<u16> {
    let cal = Calibration::ADC_12BIT;
    (0..len)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * cycles as f32 * i as f32 / len as f32;
            let value = amplitude * phase.sin();
            (cal.midpoint as f32 + value / cal.scale)
                .round()
                .clamp(0.0, 4095.0) as u16
        })
        .collect()
}
