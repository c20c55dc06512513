//! Human-readable formatting of device property values, and parsers for the
//! `exposure` command's tokens. Pure presentation: no device calls.
//!
//! Raw encodings follow the vendor conventions: f-number is hundredths in
//! the low 16 bits, shutter speed is a numerator/denominator pair packed
//! into 16+16 bits, ISO carries a mode nibble above a 24-bit value, and
//! exposure compensation is a signed milli-EV in the low 16 bits.

use crate::device::prop;

pub const FNUMBER_UNKNOWN: u32 = 0xFFFF;
pub const FNUMBER_NOTHING: u32 = 0xFFFE;

pub const SHUTTER_NOTHING: u32 = 0;
pub const SHUTTER_BULB: u32 = 0xFFFF_FFFF;

pub const ISO_AUTO: u32 = 0x00FF_FFFF;
pub const ISO_MODE_MULTI_NR: u32 = 0x1;
pub const ISO_MODE_MULTI_NR_HIGH: u32 = 0x2;

pub fn hex_code(value: u64) -> String {
    format!("0x{:X}", value)
}

/// `f/2.8`, `f/11`, or `f/--` when the lens reports nothing.
pub fn f_number(raw: u64) -> String {
    let val = (raw & 0xFFFF) as u32;
    if val == 0 || val == FNUMBER_UNKNOWN || val == FNUMBER_NOTHING {
        return "f/--".to_string();
    }
    let f = f64::from(val) / 100.0;
    if (f - f.round()).abs() < 0.05 {
        format!("f/{:.0}", f)
    } else if f < 10.0 {
        format!("f/{:.1}", f)
    } else {
        format!("f/{:.0}", f)
    }
}

/// `1/250`, `2"`, `0.50"`, `Bulb`, or `--`.
pub fn shutter_speed(raw: u64) -> String {
    let val = raw as u32;
    if val == SHUTTER_BULB {
        return "Bulb".to_string();
    }
    if val == SHUTTER_NOTHING {
        return "--".to_string();
    }
    let numerator = (val >> 16) as u16;
    let denominator = (val & 0xFFFF) as u16;
    if denominator == 0 {
        return hex_code(raw);
    }
    if numerator == 1 {
        format!("1/{}", denominator)
    } else if numerator % denominator == 0 {
        format!("{}\"", numerator / denominator)
    } else {
        let seconds = f64::from(numerator) / f64::from(denominator);
        if seconds < 10.0 {
            format!("{:.2}\"", seconds)
        } else {
            format!("{:.1}\"", seconds)
        }
    }
}

/// `ISO 800`, `ISO AUTO`, or with a noise-reduction prefix,
/// `Multi NR ISO 800`.
pub fn iso_value(raw: u64) -> String {
    let iso = raw as u32;
    let mode = (iso >> 24) & 0x0F;
    let value = iso & 0x00FF_FFFF;
    let mut out = String::new();
    if mode == ISO_MODE_MULTI_NR {
        out.push_str("Multi NR ");
    } else if mode == ISO_MODE_MULTI_NR_HIGH {
        out.push_str("Multi NR High ");
    }
    if value == ISO_AUTO {
        out.push_str("ISO AUTO");
    } else {
        out.push_str(&format!("ISO {}", value));
    }
    out
}

/// The metered ISO while AUTO is selected; empty when the body reports
/// nothing useful.
pub fn iso_current(raw: u64) -> String {
    let iso = raw as u32;
    if iso == 0 || iso == ISO_AUTO {
        return String::new();
    }
    format!("ISO {}", iso)
}

/// `+0.7`, `-2`, or `0`.
pub fn exposure_compensation(raw: u64) -> String {
    let val = (raw & 0xFFFF) as u16 as i16;
    let ev = f64::from(val) / 1000.0;
    if ev.abs() < 0.001 {
        return "0".to_string();
    }
    if (ev - ev.round()).abs() < 0.05 {
        format!("{:+.0}", ev)
    } else if (ev * 2.0 - (ev * 2.0).round()).abs() < 0.05 {
        format!("{:+.1}", ev)
    } else {
        format!("{:+.2}", ev)
    }
}

pub fn power_status(raw: u64) -> &'static str {
    match raw {
        prop::POWER_OFF => "Off",
        prop::POWER_STANDBY => "Standby",
        prop::POWER_ON => "PowerOn",
        _ => "Unknown",
    }
}

pub fn recording_state(raw: u64) -> &'static str {
    match raw {
        prop::RECORDING_NOT_RECORDING => "NotRecording",
        prop::RECORDING_RECORDING => "Recording",
        prop::RECORDING_FAILED => "RecordingFailed",
        _ => "Unknown",
    }
}

/// Exposure program modes settable from the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureProgram {
    Manual,
    ProgramAuto,
    AperturePriority,
    ShutterPriority,
    Auto,
    MovieP,
    MovieA,
    MovieS,
    MovieM,
}

impl ExposureProgram {
    pub fn code(self) -> u64 {
        match self {
            ExposureProgram::Manual => 0x01,
            ExposureProgram::ProgramAuto => 0x02,
            ExposureProgram::AperturePriority => 0x03,
            ExposureProgram::ShutterPriority => 0x04,
            ExposureProgram::Auto => 0x05,
            ExposureProgram::MovieP => 0x11,
            ExposureProgram::MovieA => 0x12,
            ExposureProgram::MovieS => 0x13,
            ExposureProgram::MovieM => 0x14,
        }
    }

    pub fn from_code(code: u64) -> Option<ExposureProgram> {
        Some(match code {
            0x01 => ExposureProgram::Manual,
            0x02 => ExposureProgram::ProgramAuto,
            0x03 => ExposureProgram::AperturePriority,
            0x04 => ExposureProgram::ShutterPriority,
            0x05 => ExposureProgram::Auto,
            0x11 => ExposureProgram::MovieP,
            0x12 => ExposureProgram::MovieA,
            0x13 => ExposureProgram::MovieS,
            0x14 => ExposureProgram::MovieM,
            _ => return None,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            ExposureProgram::Manual => "Manual",
            ExposureProgram::ProgramAuto => "Program",
            ExposureProgram::AperturePriority => "AperturePriority",
            ExposureProgram::ShutterPriority => "ShutterPriority",
            ExposureProgram::Auto => "Auto",
            ExposureProgram::MovieP => "MovieP",
            ExposureProgram::MovieA => "MovieA",
            ExposureProgram::MovieS => "MovieS",
            ExposureProgram::MovieM => "MovieM",
        }
    }
}

pub fn exposure_program(raw: u64) -> String {
    match ExposureProgram::from_code(raw) {
        Some(p) => p.label().to_string(),
        None => hex_code(raw),
    }
}

/// Lowercase and strip spaces/`-`/`_`/`+` so user spellings like
/// `Aperture-Priority` match.
fn normalize_identifier(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_' | '+'))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn parse_exposure_program(token: &str) -> Option<ExposureProgram> {
    let key = normalize_identifier(token);
    if key.is_empty() {
        return None;
    }
    let mode = match key.as_str() {
        "manual" | "m" => ExposureProgram::Manual,
        "program" | "p" => ExposureProgram::ProgramAuto,
        "aperturepriority" | "aperture" | "a" => ExposureProgram::AperturePriority,
        "shutterpriority" | "shutter" | "s" => ExposureProgram::ShutterPriority,
        "auto" => ExposureProgram::Auto,
        "moviep" => ExposureProgram::MovieP,
        "moviea" => ExposureProgram::MovieA,
        "movies" => ExposureProgram::MovieS,
        "moviem" => ExposureProgram::MovieM,
        _ => return None,
    };
    Some(mode)
}

/// Accepts `800`, `iso800`, `ISO 800`, `auto`, `a`.
pub fn parse_iso(token: &str) -> Option<u32> {
    let mut t = token.trim().to_ascii_lowercase();
    if let Some(stripped) = t.strip_prefix("iso") {
        t = stripped.trim().to_string();
    }
    if t.is_empty() {
        return None;
    }
    if t == "auto" || t == "a" {
        return Some(ISO_AUTO);
    }
    let val: u32 = t.parse().ok()?;
    if val > 0 && val <= 0x00FF_FFFF {
        Some(val & 0x00FF_FFFF)
    } else {
        None
    }
}

/// Accepts `1/250`, `0.5`, `2`, `2"`, `bulb`.
pub fn parse_shutter(token: &str) -> Option<u32> {
    let t = token.trim().trim_end_matches('"').to_ascii_lowercase();
    if t.is_empty() {
        return None;
    }
    if t == "bulb" || t == "b" {
        return Some(SHUTTER_BULB);
    }
    if let Some((num, den)) = t.split_once('/') {
        let num: u16 = num.trim().parse().ok()?;
        let den: u16 = den.trim().parse().ok()?;
        if den == 0 {
            return None;
        }
        return Some((u32::from(num) << 16) | u32::from(den));
    }
    // Whole or fractional seconds.
    let secs: f64 = t.parse().ok()?;
    if !(0.0..=u16::MAX as f64).contains(&secs) || secs == 0.0 {
        return None;
    }
    if (secs - secs.round()).abs() < 1e-9 {
        return Some(((secs as u32) << 16) | 1);
    }
    // Represent e.g. 0.5 as 5/10, 1.3 as 13/10.
    let num = (secs * 10.0).round() as u32;
    if num == 0 || num > u16::MAX as u32 {
        return None;
    }
    Some((num << 16) | 10)
}

/// Accepts `2.8`, `f2.8`, `f/2.8`, `11`.
pub fn parse_f_number(token: &str) -> Option<u32> {
    let mut t = token.trim().to_ascii_lowercase();
    if let Some(stripped) = t.strip_prefix("f/") {
        t = stripped.to_string();
    } else if let Some(stripped) = t.strip_prefix('f') {
        t = stripped.to_string();
    }
    let f: f64 = t.trim().parse().ok()?;
    if !(0.0..=650.0).contains(&f) || f == 0.0 {
        return None;
    }
    Some((f * 100.0).round() as u32)
}

/// Accepts `+0.7`, `-1`, `0.3`; returns milli-EV.
pub fn parse_exposure_compensation(token: &str) -> Option<i32> {
    let ev: f64 = token.trim().parse().ok()?;
    if !(-6.0..=6.0).contains(&ev) {
        return None;
    }
    Some((ev * 1000.0).round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f_number_formatting() {
        assert_eq!(f_number(280), "f/2.8");
        assert_eq!(f_number(400), "f/4");
        assert_eq!(f_number(1100), "f/11");
        assert_eq!(f_number(0), "f/--");
        assert_eq!(f_number(u64::from(FNUMBER_UNKNOWN)), "f/--");
        assert_eq!(f_number(u64::from(FNUMBER_NOTHING)), "f/--");
    }

    #[test]
    fn test_shutter_speed_fractions() {
        assert_eq!(shutter_speed((1 << 16) | 250), "1/250");
        assert_eq!(shutter_speed((1 << 16) | 8000), "1/8000");
    }

    #[test]
    fn test_shutter_speed_whole_seconds() {
        assert_eq!(shutter_speed((2 << 16) | 1), "2\"");
        assert_eq!(shutter_speed((30 << 16) | 1), "30\"");
    }

    #[test]
    fn test_shutter_speed_fractional_seconds() {
        assert_eq!(shutter_speed((5 << 16) | 10), "0.50\"");
        assert_eq!(shutter_speed((13 << 16) | 10), "1.30\"");
    }

    #[test]
    fn test_shutter_speed_specials() {
        assert_eq!(shutter_speed(u64::from(SHUTTER_BULB)), "Bulb");
        assert_eq!(shutter_speed(0), "--");
        // Denominator zero falls back to the raw code.
        assert_eq!(shutter_speed(2 << 16), "0x20000");
    }

    #[test]
    fn test_iso_formatting() {
        assert_eq!(iso_value(800), "ISO 800");
        assert_eq!(iso_value(u64::from(ISO_AUTO)), "ISO AUTO");
        assert_eq!(iso_value(u64::from((ISO_MODE_MULTI_NR << 24) | 800)), "Multi NR ISO 800");
        assert_eq!(
            iso_value(u64::from((ISO_MODE_MULTI_NR_HIGH << 24) | ISO_AUTO)),
            "Multi NR High ISO AUTO"
        );
    }

    #[test]
    fn test_iso_current() {
        assert_eq!(iso_current(0), "");
        assert_eq!(iso_current(u64::from(ISO_AUTO)), "");
        assert_eq!(iso_current(640), "ISO 640");
    }

    #[test]
    fn test_exposure_compensation_formatting() {
        assert_eq!(exposure_compensation(0), "0");
        assert_eq!(exposure_compensation(500), "+0.5");
        assert_eq!(exposure_compensation(700), "+0.70");
        assert_eq!(exposure_compensation(2000), "+2");
        assert_eq!(exposure_compensation(1000u64), "+1");
        // -1.0 EV as two's-complement low 16 bits.
        let raw = (-1000i16 as u16) as u64;
        assert_eq!(exposure_compensation(raw), "-1");
        let raw = (-330i16 as u16) as u64;
        assert_eq!(exposure_compensation(raw), "-0.33");
    }

    #[test]
    fn test_power_and_recording_labels() {
        assert_eq!(power_status(prop::POWER_ON), "PowerOn");
        assert_eq!(power_status(99), "Unknown");
        assert_eq!(recording_state(prop::RECORDING_RECORDING), "Recording");
        assert_eq!(recording_state(99), "Unknown");
    }

    #[test]
    fn test_exposure_program_roundtrip() {
        for p in [
            ExposureProgram::Manual,
            ExposureProgram::ProgramAuto,
            ExposureProgram::AperturePriority,
            ExposureProgram::ShutterPriority,
            ExposureProgram::Auto,
            ExposureProgram::MovieM,
        ] {
            assert_eq!(ExposureProgram::from_code(p.code()), Some(p));
        }
        assert_eq!(ExposureProgram::from_code(0xFE), None);
    }

    #[test]
    fn test_parse_exposure_program() {
        assert_eq!(parse_exposure_program("manual"), Some(ExposureProgram::Manual));
        assert_eq!(parse_exposure_program("M"), Some(ExposureProgram::Manual));
        assert_eq!(
            parse_exposure_program("Aperture-Priority"),
            Some(ExposureProgram::AperturePriority)
        );
        assert_eq!(parse_exposure_program("a"), Some(ExposureProgram::AperturePriority));
        assert_eq!(parse_exposure_program("movie m"), Some(ExposureProgram::MovieM));
        assert_eq!(parse_exposure_program("banana"), None);
        assert_eq!(parse_exposure_program(""), None);
    }

    #[test]
    fn test_parse_iso() {
        assert_eq!(parse_iso("800"), Some(800));
        assert_eq!(parse_iso("ISO 800"), Some(800));
        assert_eq!(parse_iso("iso100"), Some(100));
        assert_eq!(parse_iso("auto"), Some(ISO_AUTO));
        assert_eq!(parse_iso("a"), Some(ISO_AUTO));
        assert_eq!(parse_iso("0"), None);
        assert_eq!(parse_iso("x"), None);
        assert_eq!(parse_iso(""), None);
    }

    #[test]
    fn test_parse_shutter() {
        assert_eq!(parse_shutter("1/250"), Some((1 << 16) | 250));
        assert_eq!(parse_shutter("2"), Some((2 << 16) | 1));
        assert_eq!(parse_shutter("30\""), Some((30 << 16) | 1));
        assert_eq!(parse_shutter("0.5"), Some((5 << 16) | 10));
        assert_eq!(parse_shutter("bulb"), Some(SHUTTER_BULB));
        assert_eq!(parse_shutter("1/0"), None);
        assert_eq!(parse_shutter("fast"), None);
    }

    #[test]
    fn test_parse_shutter_roundtrips_through_formatter() {
        assert_eq!(shutter_speed(u64::from(parse_shutter("1/250").unwrap())), "1/250");
        assert_eq!(shutter_speed(u64::from(parse_shutter("2").unwrap())), "2\"");
        assert_eq!(shutter_speed(u64::from(parse_shutter("bulb").unwrap())), "Bulb");
    }

    #[test]
    fn test_parse_f_number() {
        assert_eq!(parse_f_number("2.8"), Some(280));
        assert_eq!(parse_f_number("f/4"), Some(400));
        assert_eq!(parse_f_number("F11"), Some(1100));
        assert_eq!(parse_f_number("0"), None);
        assert_eq!(parse_f_number("wide"), None);
    }

    #[test]
    fn test_parse_exposure_compensation() {
        assert_eq!(parse_exposure_compensation("+0.7"), Some(700));
        assert_eq!(parse_exposure_compensation("-1"), Some(-1000));
        assert_eq!(parse_exposure_compensation("0"), Some(0));
        assert_eq!(parse_exposure_compensation("9"), None);
        assert_eq!(parse_exposure_compensation("much"), None);
    }
}
