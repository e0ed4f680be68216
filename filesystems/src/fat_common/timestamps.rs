// DOS date/time handling for directory entries

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Timelike};
use super::DirEntry;

/// Convert FAT date/time to Unix timestamp
/// FAT date: bits 15-9: year (0=1980), bits 8-5: month, bits 4-0: day
/// FAT time: bits 15-11: hours, bits 10-5: minutes, bits 4-0: seconds/2
pub fn fat_datetime_to_unix(date: u16, time: u16) -> Option<i64> {
    let year = ((date >> 9) & 0x7F) as i32 + 1980;
    let month = ((date >> 5) & 0x0F) as u32;
    let day = (date & 0x1F) as u32;
    
    let hour = ((time >> 11) & 0x1F) as u32;
    let minute = ((time >> 5) & 0x3F) as u32;
    let second = ((time & 0x1F) * 2) as u32;
    
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .map(|dt| dt.and_utc().timestamp())
}

/// Encode a datetime into FAT (date, time), clamping the year to 1980-2107
pub fn encode_fat_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> (u16, u16) {
    let fat_year = (dt.year() - 1980).clamp(0, 127) as u16;
    
    let date = fat_year << 9 | (dt.month() as u16) << 5 | dt.day() as u16;
    let time = (dt.hour() as u16) << 11 | (dt.minute() as u16) << 5 | (dt.second() as u16 / 2);
    
    (date, time)
}

/// Current local FAT date/time
pub fn current_fat_datetime() -> (u16, u16) {
    encode_fat_datetime(&Local::now())
}

/// Every timestamp field a short directory entry carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryTimestamps {
    pub creation_tenth: u8,
    pub creation_time: u16,
    pub creation_date: u16,
    pub access_date: u16,
    pub write_time: u16,
    pub write_date: u16,
}

impl EntryTimestamps {
    /// All fields zero, for reproducible images
    pub const ZERO: EntryTimestamps = EntryTimestamps {
        creation_tenth: 0,
        creation_time: 0,
        creation_date: 0,
        access_date: 0,
        write_time: 0,
        write_date: 0,
    };
    
    /// What a freshly created entry gets
    pub fn now() -> Self {
        let (date, time) = current_fat_datetime();
        Self {
            creation_tenth: 0,
            creation_time: time,
            creation_date: date,
            access_date: date,
            write_time: time,
            write_date: date,
        }
    }
    
    pub fn of_entry(entry: &DirEntry) -> Self {
        Self {
            creation_tenth: entry.creation_time_tenth,
            creation_time: entry.creation_time,
            creation_date: entry.creation_date,
            access_date: entry.last_access_date,
            write_time: entry.write_time,
            write_date: entry.write_date,
        }
    }
    
    pub fn apply_to(&self, entry: &mut DirEntry) {
        entry.creation_time_tenth = self.creation_tenth;
        entry.creation_time = self.creation_time;
        entry.creation_date = self.creation_date;
        entry.last_access_date = self.access_date;
        entry.write_time = self.write_time;
        entry.write_date = self.write_date;
    }
    
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}
