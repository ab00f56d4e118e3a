use anyhow::Result;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, Table};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

pub fn write_rows<W: Write>(
    out: &mut W,
    format: OutputFormat,
    headers: &[&str],
    rows: &[Vec<String>],
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(headers.to_vec());
            for row in rows {
                table.add_row(row.clone());
            }
            writeln!(out, "{}", table)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            writer.write_record(headers)?;
            for row in rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => {
            let objects: Vec<serde_json::Map<String, serde_json::Value>> = rows
                .iter()
                .map(|row| {
                    headers
                        .iter()
                        .zip(row)
                        .map(|(h, v)| (h.to_string(), serde_json::Value::String(v.clone())))
                        .collect()
                })
                .collect();
            serde_json::to_writer_pretty(&mut *out, &objects)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn print_rows(format: OutputFormat, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    write_rows(&mut lock, format, headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(format: OutputFormat) -> String {
        let rows = vec![
            vec!["1".to_string(), "2024-06-01 12:05:00".to_string()],
            vec!["2".to_string(), "2024-06-01 12:10:00".to_string()],
        ];
        let mut buf = Vec::new();
        write_rows(&mut buf, format, &["#", "Run at"], &rows).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_csv_output() {
        let text = render(OutputFormat::Csv);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["#,Run at", "1,2024-06-01 12:05:00", "2,2024-06-01 12:10:00"]);
    }

    #[test]
    fn test_json_output() {
        let value: serde_json::Value = serde_json::from_str(&render(OutputFormat::Json)).unwrap();
        assert_eq!(value[1]["Run at"], "2024-06-01 12:10:00");
    }

    #[test]
    fn test_table_output() {
        let text = render(OutputFormat::Table);
        assert!(text.contains("Run at"));
        assert!(text.contains("2024-06-01 12:10:00"));
    }
}
