use crate::Config;
use flate2::{write::GzEncoder, Compression};
use log::*;
use log4rs::{
    append::{
        rolling_file::{
            policy::compound::{roll::Roll, trigger::size::SizeTrigger, CompoundPolicy},
            RollingFileAppender,
        },
        Append,
    },
    config::{Appender, Config as Log4rsConfig, Root},
    encode::{self, Encode},
    filter::{Filter, Response},
};
use once_cell::sync::Lazy;
use std::{
    fmt::{self, Display, Formatter},
    fs::{self, File},
    io::{self, stdout, Write},
    path::{Component, Path, PathBuf},
    sync::Mutex,
    thread,
};
use termion::color;
use time::{
    format_description::{self, FormatItem},
    OffsetDateTime,
    UtcOffset,
};

static TIME_FORMAT: Lazy<Vec<FormatItem<'static>>> = Lazy::new(|| {
    format_description::parse("[hour repr:24]:[minute]:[second]")
        .expect("Invalid time format description")
});

static DATE_FORMAT: Lazy<Vec<FormatItem<'static>>> =
    Lazy::new(|| format_description::parse("[year]-[month]-[day]").expect("Invalid date format"));

/// Crates whose records reach the appenders in debug builds.
const LOGGED_CRATES: &[&str] = &["server", "controller", "io", "common"];

const LATEST_LOG: &str = "latest.log";
const ROLLING_LOG: &str = "rolling.log";
const ROLL_SIZE: u64 = 50_000_000;

#[cfg(debug_assertions)]
const LEVEL_FILTER: LevelFilter = LevelFilter::Debug;
#[cfg(not(debug_assertions))]
const LEVEL_FILTER: LevelFilter = LevelFilter::Info;

macro_rules! format_record {
    ($writer:expr, $record:expr) => {{
        let record = $record;
        let location = Location::of(record);
        let separator = if location.is_some() { " " } else { "" };

        writeln!(
            $writer,
            "[{} {}{}{}]: {}",
            format_time(current_time()),
            record.level(),
            separator,
            location,
            record.args()
        )
    }};
}

/// Logs to the console in color and to `<log dir>/latest.log`, which is gzipped away under a
/// dated name whenever it grows past the size limit.
pub fn init_logger() -> anyhow::Result<()> {
    let log_file = RollingFileAppender::builder()
        .encoder(Box::new(LogEncoder))
        .build(
            log_path(LATEST_LOG),
            Box::new(CompoundPolicy::new(
                Box::new(SizeTrigger::new(ROLL_SIZE)),
                Box::new(ArchiveRoller::new()),
            )),
        )?;

    let config = Log4rsConfig::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(CrateFilter))
                .build("console", Box::new(ConsoleAppender)),
        )
        .appender(
            Appender::builder()
                .filter(Box::new(CrateFilter))
                .build("log_file", Box::new(log_file)),
        )
        .build(
            Root::builder()
                .appender("console")
                .appender("log_file")
                .build(LEVEL_FILTER),
        )?;

    log4rs::init_config(config)?;
    Ok(())
}

/// Archives whatever is in the latest log. Call once right before exiting.
pub fn cleanup() {
    let _ = ArchiveRoller::new().archive(&log_path(LATEST_LOG), false);
}

fn log_path(name: &str) -> PathBuf {
    Config::get().log_dir.join(name)
}

fn current_time() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    let offset = Config::get()
        .utc_offset
        .or_else(|| UtcOffset::local_offset_at(now).ok());

    match offset {
        Some(offset) => now.to_offset(offset),
        None => now,
    }
}

fn format_time(datetime: OffsetDateTime) -> String {
    datetime
        .format(&*TIME_FORMAT)
        .unwrap_or_else(|_| "??:??:??".to_owned())
}

#[derive(Debug)]
struct CrateFilter;

impl Filter for CrateFilter {
    #[cfg(debug_assertions)]
    fn filter(&self, record: &Record<'_>) -> Response {
        let ours = record.module_path().map_or(false, |path| {
            let root = path.split("::").next().unwrap_or(path);
            LOGGED_CRATES.contains(&root)
        });

        if ours {
            Response::Accept
        } else {
            Response::Reject
        }
    }

    #[cfg(not(debug_assertions))]
    fn filter(&self, _record: &Record<'_>) -> Response {
        Response::Neutral
    }
}

#[derive(Debug)]
struct ConsoleAppender;

impl Append for ConsoleAppender {
    fn append(&self, record: &Record<'_>) -> anyhow::Result<()> {
        let mut writer = stdout().lock();
        match record.level() {
            Level::Error => write!(writer, "{}", color::Fg(color::Red))?,
            Level::Warn => write!(writer, "{}", color::Fg(color::LightYellow))?,
            Level::Debug | Level::Trace => write!(writer, "{}", color::Fg(color::LightCyan))?,
            Level::Info => write!(writer, "{}", color::Fg(color::Reset))?,
        }
        format_record!(&mut writer, record)?;
        write!(writer, "{}", color::Fg(color::Reset))?;
        Ok(())
    }

    fn flush(&self) {}
}

#[derive(Debug)]
struct LogEncoder;

impl Encode for LogEncoder {
    fn encode(&self, writer: &mut dyn encode::Write, record: &Record<'_>) -> anyhow::Result<()> {
        format_record!(writer, record).map_err(Into::into)
    }
}

/// Day of year and how many logs were archived on it.
#[derive(Debug)]
struct ArchiveCount {
    day: u16,
    count: u32,
}

/// Moves a full log aside and compresses it to `<date>-<n>.log.gz`.
#[derive(Debug)]
struct ArchiveRoller {
    today: Mutex<ArchiveCount>,
}

impl ArchiveRoller {
    fn new() -> Self {
        let now = current_time();
        let date = now.format(&*DATE_FORMAT).unwrap_or_default();

        // Continue numbering after archives already written today
        let count = fs::read_dir(&Config::get().log_dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(&date))
            .filter_map(|name| Self::archive_index(&name))
            .max()
            .unwrap_or(0);

        Self {
            today: Mutex::new(ArchiveCount {
                day: now.ordinal(),
                count,
            }),
        }
    }

    // "2022-01-31-4.log.gz" -> 4
    fn archive_index(name: &str) -> Option<u32> {
        let stem = name.strip_suffix(".log.gz")?;
        stem.rsplit('-').next()?.parse().ok()
    }

    fn archive(&self, file: &Path, in_background: bool) -> anyhow::Result<()> {
        let now = current_time();
        let index = {
            let mut today = self.today.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if today.day != now.ordinal() {
                today.day = now.ordinal();
                today.count = 0;
            }
            today.count = today.count.saturating_add(1);
            today.count
        };

        // Renamed first so the appender can reopen latest.log while compression runs
        let rolling = log_path(ROLLING_LOG);
        fs::rename(file, &rolling)?;

        let archive = log_path(&format!("{}-{}.log.gz", now.format(&*DATE_FORMAT)?, index));

        if in_background {
            thread::spawn(move || Self::compress_logged(&rolling, &archive));
        } else {
            Self::compress_logged(&rolling, &archive);
        }

        Ok(())
    }

    fn compress_logged(input: &Path, output: &Path) {
        if let Err(error) = Self::compress(input, output) {
            error!("Failed to compress {}: {}", input.display(), error);
        }
    }

    fn compress(input: &Path, output: &Path) -> io::Result<()> {
        let mut source = File::open(input)?;
        let mut encoder = GzEncoder::new(File::create(output)?, Compression::default());
        io::copy(&mut source, &mut encoder)?;
        encoder.finish()?;
        // Some platforms refuse to remove a file that is still open
        drop(source);
        fs::remove_file(input)
    }
}

impl Roll for ArchiveRoller {
    fn roll(&self, file: &Path) -> anyhow::Result<()> {
        self.archive(file, true)
    }
}

/// Source location shown for debug and error records, relative to the crate's `src`.
struct Location {
    file: Option<String>,
    line: u32,
}

impl Location {
    fn of(record: &Record<'_>) -> Self {
        let file = match (record.level(), record.file(), record.line()) {
            (Level::Info | Level::Warn, ..) => None,
            (_, Some(file), Some(line)) => return Self {
                file: Some(Self::relative_to_src(file)),
                line,
            },
            _ => None,
        };

        Self { file, line: 0 }
    }

    fn is_some(&self) -> bool {
        self.file.is_some()
    }

    fn relative_to_src(file: &str) -> String {
        let relative = Path::new(file)
            .components()
            .skip_while(|component| component != &Component::Normal("src".as_ref()))
            .skip(1)
            .collect::<PathBuf>();

        if relative.as_os_str().is_empty() {
            file.to_owned()
        } else {
            relative.to_string_lossy().into_owned()
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}", file, self.line),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_index_is_parsed_from_name() {
        assert_eq!(ArchiveRoller::archive_index("2022-01-31-4.log.gz"), Some(4));
        assert_eq!(ArchiveRoller::archive_index("2022-01-31-12.log.gz"), Some(12));
        assert_eq!(ArchiveRoller::archive_index("latest.log"), None);
    }

    #[test]
    fn location_is_relative_to_src() {
        assert_eq!(
            Location::relative_to_src("controller/src/session.rs"),
            "session.rs"
        );
        assert_eq!(Location::relative_to_src("main.rs"), "main.rs");
    }
}
