use crate::config::{AudioSection, CompatibilityMode};

/// The composed audio side of a transcode job: an optional `-af` filter
/// chain plus the codec/bitrate/channel layout the encoder should target.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPlan {
    pub filter: Option<String>,
    pub codec: Option<String>,
    pub bitrate_kbps: Option<u32>,
    pub output_channels: u32,
    pub output_channel_layout: String,
    pub applied_label: String,
}

impl AudioPlan {
    fn silent() -> Self {
        Self {
            filter: None,
            codec: None,
            bitrate_kbps: None,
            output_channels: 0,
            output_channel_layout: String::new(),
            applied_label: "none".to_string(),
        }
    }
}

fn loudnorm_filter(audio: &AudioSection) -> Option<String> {
    let norm = &audio.normalization;
    if !norm.enabled {
        return None;
    }
    let i = norm.target_lufs.clamp(-36.0, -10.0);
    let lra = norm.lra.clamp(1.0, 20.0);
    let tp = norm.true_peak.min(-0.1);
    let dual_mono = if norm.dual_mono { "true" } else { "false" };
    Some(format!(
        "loudnorm=I={i}:TP={tp}:LRA={lra}:dual_mono={dual_mono}:print_format=summary"
    ))
}

fn pan_to_51(channels: u32, audio: &AudioSection) -> Option<String> {
    let rear = audio.stereo_upmixing.rear_channel_level;
    let center = audio.stereo_upmixing.center_channel_level;
    let lfe = audio.stereo_upmixing.lfe_channel_level;

    let expr = match channels {
        1 => format!(
            "pan=5.1|FL=1.0*c0|FR=1.0*c0|FC={center}*c0|LFE={lfe}*c0|BL={rear}*c0|BR={rear}*c0"
        ),
        2 => format!(
            "pan=5.1|FL=c0|FR=c1|FC={center}*(c0+c1)|LFE={lfe}*(c0+c1)|BL={rear}*c0|BR={rear}*c1"
        ),
        3 => format!(
            "pan=5.1|FL=c0|FR=c1|FC={center}*(c0+c1)|LFE=c2|BL={rear}*c0|BR={rear}*c1"
        ),
        4 => format!(
            "pan=5.1|FL=c0|FR=c1|FC={center}*(c0+c1)|LFE={lfe}*(c0+c1)|BL=c2|BR=c3"
        ),
        5 => "pan=5.1|FL=c0|FR=c1|FC=c2|LFE=0.1*(c0+c1)|BL=c3|BR=c4".to_string(),
        _ => return None,
    };
    Some(expr)
}

fn codec_and_bitrate(audio: &AudioSection, output_channels: u32) -> (String, u32) {
    let multichannel = output_channels > 2;
    if audio.compatibility.force_aac {
        let cap = if multichannel { 384 } else { 256 };
        let configured = if multichannel {
            audio.codec_preferences.multichannel_bitrate
        } else {
            audio.codec_preferences.stereo_bitrate
        };
        return ("aac".to_string(), configured.min(cap));
    }
    if multichannel {
        let codec = audio.codec_preferences.multichannel.clone();
        if codec.eq_ignore_ascii_case("ac3") {
            tracing::warn!("using AC-3 for multichannel audio output; AAC is the preferred default");
        }
        (codec, audio.codec_preferences.multichannel_bitrate)
    } else {
        (
            audio.codec_preferences.stereo.clone(),
            audio.codec_preferences.stereo_bitrate,
        )
    }
}

/// True when the stereo fallback mode applies: 5.1 processing disabled,
/// compatibility mode pins stereo output, or compatibility mode is `auto`
/// with `fallbackToStereo` enabled.
pub fn wants_stereo_fallback(audio: &AudioSection) -> bool {
    !audio.enabled_51_processing
        || audio.compatibility.compatibility_mode == CompatibilityMode::Stereo
        || (audio.compatibility.compatibility_mode == CompatibilityMode::Auto
            && audio.compatibility.fallback_to_stereo)
}

fn stereo_compatible_plan(audio: &AudioSection) -> AudioPlan {
    let filter = loudnorm_filter(audio);
    AudioPlan {
        filter,
        codec: Some("aac".to_string()),
        bitrate_kbps: Some(audio.codec_preferences.stereo_bitrate),
        output_channels: 2,
        output_channel_layout: "stereo".to_string(),
        applied_label: "stereo-compatible".to_string(),
    }
}

/// Builds the audio plan. `force_stereo_fallback` is set by the
/// caller either from config (`wants_stereo_fallback`) or by the
/// compatibility retry after a first attempt failed.
pub fn plan_audio(channels: u32, channel_layout: Option<&str>, audio: &AudioSection, force_stereo_fallback: bool) -> AudioPlan {
    if channels == 0 {
        return AudioPlan::silent();
    }
    if force_stereo_fallback {
        return stereo_compatible_plan(audio);
    }

    if channels >= 6 {
        let preserve = audio.compatibility.preserve_original_if_multichannel
            && matches!(channel_layout, Some("5.1") | Some("5.1(side)"));
        let filter = loudnorm_filter(audio);
        let label = if preserve {
            "light-normalized-passthrough"
        } else {
            "normalized-multichannel"
        };
        let (codec, bitrate) = codec_and_bitrate(audio, channels);
        return AudioPlan {
            filter,
            codec: Some(codec),
            bitrate_kbps: Some(bitrate),
            output_channels: channels,
            output_channel_layout: channel_layout.unwrap_or("5.1").to_string(),
            applied_label: label.to_string(),
        };
    }

    let mut parts = Vec::new();
    if let Some(norm) = loudnorm_filter(audio) {
        parts.push(norm);
    }
    if let Some(pan) = pan_to_51(channels, audio) {
        parts.push(pan);
    }
    let filter = if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    };

    let (codec, bitrate) = codec_and_bitrate(audio, 6);
    AudioPlan {
        filter,
        codec: Some(codec),
        bitrate_kbps: Some(bitrate),
        output_channels: 6,
        output_channel_layout: "5.1".to_string(),
        applied_label: format!("upmixed-{channels}ch-to-5.1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_cfg() -> AudioSection {
        AudioSection::default()
    }

    #[test]
    fn zero_channels_yields_silent_plan() {
        let plan = plan_audio(0, None, &audio_cfg(), false);
        assert_eq!(plan.applied_label, "none");
        assert!(plan.filter.is_none());
    }

    #[test]
    fn mono_upmixes_to_51() {
        let plan = plan_audio(1, None, &audio_cfg(), false);
        assert_eq!(plan.output_channels, 6);
        assert!(plan.filter.as_ref().unwrap().contains("pan=5.1"));
    }

    #[test]
    fn stereo_fallback_skips_pan_filters() {
        let plan = plan_audio(2, Some("stereo"), &audio_cfg(), true);
        assert_eq!(plan.applied_label, "stereo-compatible");
        assert_eq!(plan.output_channels, 2);
        assert!(plan
            .filter
            .as_ref()
            .map(|f| !f.contains("pan="))
            .unwrap_or(true));
    }

    #[test]
    fn preserve_original_skips_pan_for_existing_51() {
        let mut cfg = audio_cfg();
        cfg.compatibility.preserve_original_if_multichannel = true;
        let plan = plan_audio(6, Some("5.1"), &cfg, false);
        assert_eq!(plan.applied_label, "light-normalized-passthrough");
        assert!(plan
            .filter
            .as_ref()
            .map(|f| !f.contains("pan="))
            .unwrap_or(true));
    }

    #[test]
    fn force_aac_caps_multichannel_bitrate() {
        let mut cfg = audio_cfg();
        cfg.compatibility.force_aac = true;
        cfg.codec_preferences.multichannel_bitrate = 999;
        let plan = plan_audio(6, Some("7.1"), &cfg, false);
        assert_eq!(plan.codec.as_deref(), Some("aac"));
        assert_eq!(plan.bitrate_kbps, Some(384));
    }

    #[test]
    fn disabled_51_processing_forces_stereo_fallback() {
        let mut cfg = audio_cfg();
        cfg.enabled_51_processing = false;
        cfg.compatibility.fallback_to_stereo = false;
        assert!(wants_stereo_fallback(&cfg));
    }

    #[test]
    fn compatibility_mode_stereo_forces_fallback_even_with_51_enabled() {
        let mut cfg = audio_cfg();
        cfg.compatibility.fallback_to_stereo = false;
        cfg.compatibility.compatibility_mode = CompatibilityMode::Stereo;
        assert!(wants_stereo_fallback(&cfg));
    }

    #[test]
    fn auto_mode_with_fallback_to_stereo_forces_fallback() {
        let mut cfg = audio_cfg();
        cfg.compatibility.compatibility_mode = CompatibilityMode::Auto;
        cfg.compatibility.fallback_to_stereo = true;
        assert!(wants_stereo_fallback(&cfg));
    }

    #[test]
    fn auto_mode_without_fallback_to_stereo_does_not_force_fallback() {
        let mut cfg = audio_cfg();
        cfg.compatibility.compatibility_mode = CompatibilityMode::Auto;
        cfg.compatibility.fallback_to_stereo = false;
        assert!(!wants_stereo_fallback(&cfg));
    }
}
