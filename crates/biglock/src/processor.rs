//! Processor frequency probe for the descriptive `processor_frequency_mhz` metric.

use std::fs;

const SYSFS_MAX_FREQ: &str = "/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq";
const PROC_CPUINFO: &str = "/proc/cpuinfo";

/// Nominal frequency of the first processor in MHz, if the platform exposes it.
pub fn frequency_mhz() -> Option<u64> {
    if let Ok(text) = fs::read_to_string(SYSFS_MAX_FREQ) {
        if let Some(mhz) = parse_sysfs_khz(&text) {
            return Some(mhz);
        }
    }
    match fs::read_to_string(PROC_CPUINFO) {
        Ok(text) => parse_cpuinfo_mhz(&text),
        Err(e) => {
            tracing::debug!(%e, "no processor frequency source available");
            None
        }
    }
}

fn parse_sysfs_khz(text: &str) -> Option<u64> {
    let khz: u64 = text.trim().parse().ok()?;
    Some(khz / 1_000)
}

fn parse_cpuinfo_mhz(text: &str) -> Option<u64> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim() == "cpu MHz")
        .and_then(|(_, value)| value.trim().parse::<f64>().ok())
        .map(|mhz| mhz as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sysfs_reports_khz() {
        assert_eq!(parse_sysfs_khz("3600000\n"), Some(3_600));
        assert_eq!(parse_sysfs_khz("n/a"), None);
    }

    #[test]
    fn cpuinfo_uses_first_mhz_line() {
        let text = "processor\t: 0\nmodel name\t: Example CPU\ncpu MHz\t\t: 2893.204\n\
                    processor\t: 1\ncpu MHz\t\t: 1200.000\n";
        assert_eq!(parse_cpuinfo_mhz(text), Some(2_893));
        assert_eq!(parse_cpuinfo_mhz("processor\t: 0\n"), None);
    }
}
