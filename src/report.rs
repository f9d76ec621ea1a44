use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;
use chrono::Local;
use crossterm::style::{Color, Stylize};
use crossterm::tty::IsTty;
use tracing::info;

use crate::metrics::{Summary, SummaryReport};

const REPORT_DATE_PLACEHOLDER: &str = "%%report_date%%";
const REPORT_DATA_PLACEHOLDER: &str = "%%report_data%%";
const BUILTIN_TEMPLATE: &str = include_str!("../templates/report_template.html");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReportFormat {
    Html,
    Json,
}

impl ReportFormat {
    pub(crate) fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ReportFormat::Json,
            _ => ReportFormat::Html,
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Html => write!(f, "HTML"),
            ReportFormat::Json => write!(f, "JSON"),
        }
    }
}

/// Prints the results to stdout, coloured when stdout is a terminal.
pub(crate) fn print_console(report: &SummaryReport) -> io::Result<()> {
    let stdout = io::stdout();
    let colored = stdout.is_tty();
    let mut out = stdout.lock();
    write_console(&mut out, report, colored)?;
    out.flush()
}

fn paint(count: usize, color: Color, colored: bool) -> String {
    if colored && count > 0 {
        count.to_string().with(color).bold().to_string()
    } else {
        count.to_string()
    }
}

fn write_console(out: &mut impl Write, report: &SummaryReport, colored: bool) -> io::Result<()> {
    writeln!(out, "{} RESULTS {}", "#".repeat(10), "#".repeat(10))?;
    for (url, data) in report {
        writeln!(out, "[ {url} ]:")?;
        writeln!(out, "\t- Success: {}", paint(data.success, Color::Green, colored))?;
        writeln!(out, "\t- Failed: {}", paint(data.failed, Color::Yellow, colored))?;
        writeln!(out, "\t- Errors: {}", paint(data.errors, Color::Red, colored))?;
        writeln!(out, "\t- Min: {:.03} sec.", data.min)?;
        writeln!(out, "\t- Max: {:.03} sec.", data.max)?;
        writeln!(out, "\t- Avg: {:.03} sec.", data.avg)?;
        writeln!(out)?;
    }
    Ok(())
}

fn escape_html(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(raw);
    }
    let mut escaped = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

fn render_row(rows: &mut String, url: &str, data: &Summary) {
    let _ = write!(
        rows,
        "<tr>\
            <td>{}</td>\
            <td>{}</td>\
            <td>{}</td>\
            <td>{}</td>\
            <td>{:.03}</td>\
            <td>{:.03}</td>\
            <td>{:.03}</td>\
        </tr>\n",
        escape_html(url),
        data.success,
        data.failed,
        data.errors,
        data.min,
        data.max,
        data.avg
    );
}

pub(crate) fn render_html(template: &str, report: &SummaryReport, report_date: &str) -> String {
    let mut rows = String::new();
    for (url, data) in report {
        render_row(&mut rows, url, data);
    }
    template
        .replace(REPORT_DATE_PLACEHOLDER, report_date)
        .replace(REPORT_DATA_PLACEHOLDER, &rows)
}

/// Writes the report to `path`. `template` replaces the built-in HTML
/// template and is ignored for JSON output.
pub(crate) fn write_report(
    path: &Path,
    template: Option<&Path>,
    report: &SummaryReport,
) -> anyhow::Result<()> {
    let format = ReportFormat::from_path(path);
    let contents = match format {
        ReportFormat::Json => {
            serde_json::to_string_pretty(report).context("Failed to generate report in JSON")?
        }
        ReportFormat::Html => {
            let template = match template {
                Some(template) => Cow::Owned(fs::read_to_string(template).with_context(|| {
                    format!(
                        "Failed to generate report in HTML: cannot read template {}",
                        template.display()
                    )
                })?),
                None => Cow::Borrowed(BUILTIN_TEMPLATE),
            };
            let report_date = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            render_html(&template, report, &report_date)
        }
    };

    fs::write(path, contents)
        .with_context(|| format!("Failed to save results to file `{}`", path.display()))?;
    info!("{format} report generated successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SummaryReport {
        let mut report = SummaryReport::new();
        report.insert(
            "http://a.example.com".into(),
            Summary {
                success: 3,
                failed: 1,
                errors: 0,
                min: 0.0126,
                max: 0.5,
                avg: 0.25,
            },
        );
        report.insert(
            "http://b.example.com/?x=1&y=2".into(),
            Summary {
                errors: 2,
                ..Summary::default()
            },
        );
        report
    }

    #[test]
    fn it_should_pick_format_from_extension() {
        assert_eq!(ReportFormat::from_path(Path::new("out.json")), ReportFormat::Json);
        assert_eq!(ReportFormat::from_path(Path::new("OUT.JSON")), ReportFormat::Json);
        assert_eq!(ReportFormat::from_path(Path::new("out.html")), ReportFormat::Html);
        assert_eq!(ReportFormat::from_path(Path::new("out")), ReportFormat::Html);
    }

    #[test]
    fn it_should_print_every_url() {
        let mut out = Vec::new();
        write_console(&mut out, &sample(), false).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("########## RESULTS ##########\n"));
        assert!(text.contains("[ http://a.example.com ]:\n\t- Success: 3\n\t- Failed: 1\n\t- Errors: 0\n"));
        assert!(text.contains("\t- Min: 0.013 sec.\n\t- Max: 0.500 sec.\n\t- Avg: 0.250 sec.\n"));
        assert!(text.contains("[ http://b.example.com/?x=1&y=2 ]:"));
    }

    #[test]
    fn it_should_fill_template_placeholders() {
        let template = "<p>%%report_date%%</p><table>%%report_data%%</table>";

        let html = render_html(template, &sample(), "2024-01-02 03:04:05");

        assert!(html.starts_with("<p>2024-01-02 03:04:05</p><table><tr>"));
        assert!(!html.contains("%%"));
        assert!(html.contains(
            "<tr><td>http://a.example.com</td><td>3</td><td>1</td><td>0</td>\
             <td>0.013</td><td>0.500</td><td>0.250</td></tr>"
        ));
        assert!(html.contains("<td>http://b.example.com/?x=1&amp;y=2</td>"));
        assert_eq!(html.matches("<tr>").count(), 2);
    }

    #[test]
    fn it_should_write_html_with_builtin_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");

        write_report(&path, None, &sample()).unwrap();

        let html = fs::read_to_string(&path).unwrap();
        assert!(html.contains("<td>http://a.example.com</td>"));
        assert!(!html.contains(REPORT_DATE_PLACEHOLDER));
        assert!(!html.contains(REPORT_DATA_PLACEHOLDER));
    }

    #[test]
    fn it_should_write_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_report(&path, None, &sample()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["http://a.example.com"]["success"], 3);
        assert_eq!(json["http://b.example.com/?x=1&y=2"]["errors"], 2);
    }

    #[test]
    fn it_should_fail_on_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");

        let result = write_report(&path, Some(Path::new("missing-template.html")), &sample());

        assert!(result.is_err());
        assert!(!path.exists());
    }
}
