use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970)
const NTP_EPOCH_OFFSET: u64 = 2_208_988_800;
const NTP_IMMEDIATELY: u64 = 1;

/// Bundle execution time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeTag {
    /// Execute as soon as the bundle arrives
    #[default]
    Immediately,
    /// Execute at an absolute wall clock time
    At(SystemTime),
}

impl TimeTag {
    /// A time tag `delay` from now.
    pub fn after(delay: Duration) -> Self {
        TimeTag::At(SystemTime::now() + delay)
    }

    pub fn from_ntp(raw: u64) -> Self {
        if raw == NTP_IMMEDIATELY {
            return TimeTag::Immediately;
        }
        let seconds = raw >> 32;
        let fraction = raw & 0xFFFF_FFFF;
        let nanos = (fraction * 1_000_000_000) >> 32;
        let unix_seconds = seconds.saturating_sub(NTP_EPOCH_OFFSET);
        TimeTag::At(UNIX_EPOCH + Duration::new(unix_seconds, nanos as u32))
    }

    pub fn to_ntp(&self) -> u64 {
        match self {
            TimeTag::Immediately => NTP_IMMEDIATELY,
            TimeTag::At(time) => {
                let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
                let seconds = since_epoch.as_secs() + NTP_EPOCH_OFFSET;
                let fraction = (u64::from(since_epoch.subsec_nanos()) << 32) / 1_000_000_000;
                (seconds << 32) | (fraction & 0xFFFF_FFFF)
            }
        }
    }
}
