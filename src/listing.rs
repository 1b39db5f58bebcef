//! Parser for the output of `find <dir> -print -ls`.
//!
//! Each entry takes two lines: the path as printed by `-print`, then the `-ls` detail line
//!
//! ```text
//! <inode> <blocks> <perm-string> <links> <owner> <group> <size> <month> <day> <time> <path>
//! ```
//!
//! The detail line carries no year for recent entries, so the current UTC year is assumed.
//! Entries modified in another calendar year within the last six months are misdated by
//! that assumption. Older entries show a year in place of the time, which is used as is.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::{
    entry::{FileSystemEntry, FileSystemEntryType},
    error::{Error, Result},
};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Clone, Copy)]
enum State {
    ExpectPathLine,
    ExpectDetailLine { start: usize, end: usize },
    End,
}

/// Lazy iterator over the entries of a bulk listing.
///
/// Owns the buffered command output and parses one entry per call to `next`.
/// Fused after the first error: a malformed line ends the listing.
pub struct BulkListing {
    output: String,
    position: usize,
    line: usize,
    year: i32,
    state: State,
}

impl BulkListing {
    /// Parses assuming the current UTC year for timestamps without one.
    #[must_use]
    pub fn new<T: Into<String>>(output: T) -> Self {
        Self::with_year(output, Utc::now().year())
    }

    #[must_use]
    pub fn with_year<T: Into<String>>(output: T, year: i32) -> Self {
        Self {
            output: output.into(),
            position: 0,
            line: 0,
            year,
            state: State::ExpectPathLine,
        }
    }

    /// Byte range of the next line, without its terminator.
    fn next_line(&mut self) -> Option<(usize, usize)> {
        if self.position >= self.output.len() {
            return None;
        }

        let start = self.position;
        let rest = &self.output[start..];
        let (mut end, advance) = match rest.find('\n') {
            Some(index) => (start + index, index + 1),
            None => (self.output.len(), rest.len()),
        };
        if self.output[start..end].ends_with('\r') {
            end -= 1;
        }

        self.position += advance;
        self.line += 1;
        Some((start, end))
    }

    fn parse_detail(&self, path: &str, detail: &str) -> Result<FileSystemEntry> {
        let tokens: Vec<&str> = detail.split_whitespace().collect();
        if tokens.len() < 3 {
            return Err(Error::parse(self.line, detail, "fewer than 3 fields"));
        }

        let entry_type = FileSystemEntryType::from_is_directory(tokens[2].starts_with('d'));

        // The path may contain whitespace or repeat an earlier column, so it is cut from the
        // end of the line. Symlinks end with ` -> <target>` instead.
        let prefix = match detail.strip_suffix(path) {
            Some(prefix) if prefix.ends_with(' ') => prefix,
            _ => match detail.rfind(&format!(" {path} -> ")) {
                Some(index) => &detail[..index],
                None => return Err(Error::parse(self.line, detail, "path is not repeated")),
            },
        };
        let fields: Vec<&str> = prefix.split_whitespace().collect();
        let [.., month, day, clock] = fields[..] else {
            return Err(Error::parse(self.line, detail, "missing modification time"));
        };

        let modified = self
            .parse_timestamp(month, day, clock)
            .ok_or_else(|| Error::parse(self.line, detail, "invalid modification time"))?;

        Ok(FileSystemEntry::new(path, entry_type, Some(modified)))
    }

    /// `clock` is either `HH:MM` (current year assumed) or a four-digit year.
    fn parse_timestamp(&self, month: &str, day: &str, clock: &str) -> Option<DateTime<Utc>> {
        let month = MONTHS.iter().position(|m| *m == month)? as u32 + 1;
        let day: u32 = day.parse().ok()?;

        let (year, hour, minute) = match clock.split_once(':') {
            Some((hour, minute)) => (self.year, hour.parse().ok()?, minute.parse().ok()?),
            None if clock.len() == 4 => (clock.parse().ok()?, 0, 0),
            None => return None,
        };

        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        Some(date.and_hms_opt(hour, minute, 0)?.and_utc())
    }
}

impl Iterator for BulkListing {
    type Item = Result<FileSystemEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                State::End => return None,
                State::ExpectPathLine => match self.next_line() {
                    None => {
                        self.state = State::End;
                        return None;
                    }
                    Some((start, end)) if start == end => {
                        self.state = State::End;
                        return Some(Err(Error::parse(self.line, "", "empty path line")));
                    }
                    Some((start, end)) => self.state = State::ExpectDetailLine { start, end },
                },
                State::ExpectDetailLine { start, end } => {
                    let Some((detail_start, detail_end)) = self.next_line() else {
                        self.state = State::End;
                        return Some(Err(Error::parse(
                            self.line,
                            &self.output[start..end],
                            "path line without detail line",
                        )));
                    };

                    let result = self.parse_detail(
                        &self.output[start..end],
                        &self.output[detail_start..detail_end],
                    );
                    self.state = match result {
                        Ok(_) => State::ExpectPathLine,
                        Err(_) => State::End,
                    };

                    if let Ok(entry) = &result {
                        trace!("parsed {} {}", entry.entry_type(), entry.path());
                    }
                    return Some(result);
                }
            }
        }
    }
}
