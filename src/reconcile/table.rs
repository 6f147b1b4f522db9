use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use calamine::{Data, Range, Reader, Xlsx};
use flate2::read::GzDecoder;

use crate::reconcile::TableError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b'\t', b';'];
const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// An uploaded table, kept as text so it can be exported unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Pick the candidate delimiter occurring most often in the header line.
/// Falls back to a comma.
pub fn sniff_delimiter(data: &[u8]) -> u8 {
    let header = data.split(|&b| b == b'\n').next().unwrap_or_default();

    let mut best = (b',', 0);
    for &candidate in CANDIDATE_DELIMITERS.iter() {
        let count = header.iter().filter(|&&b| b == candidate).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| SPREADSHEET_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

/// Text of a spreadsheet cell as it would appear in a CSV export.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            None => dt.as_f64().to_string(),
        },
    }
}

/// First sheet of a workbook, its first row being the header.
fn first_sheet<RS, R>(workbook: &mut R) -> Result<Table, TableError>
where
    RS: Read + Seek,
    R: Reader<RS>,
    calamine::Error: From<R::Error>,
{
    let range: Range<Data> = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(calamine::Error::from)?,
        None => return Err(TableError::Empty),
    };

    let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    let headers = match rows.next() {
        Some(headers) if headers.iter().any(|h| !h.is_empty()) => headers,
        _ => return Err(TableError::Empty),
    };

    Ok(Table { headers, rows: rows.collect() })
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Parse delimited text. Without an explicit delimiter it is sniffed from
    /// the header line.
    pub fn from_reader<R: Read>(mut reader: R, delimiter: Option<u8>) -> Result<Table, TableError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).map_err(|e| TableError::IO("input".to_string(), e))?;

        let mut data = &data[..];
        if data.starts_with(UTF8_BOM) {
            data = &data[UTF8_BOM.len()..];
        }
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(TableError::Empty);
        }

        let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(data));
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(data);

        let headers = csv_reader.headers()?.iter().map(|h| h.to_string()).collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            rows.push(record?.iter().map(|cell| cell.to_string()).collect());
        }

        Ok(Table { headers, rows })
    }

    /// Read the first sheet of an xlsx workbook.
    pub fn from_xlsx<RS: Read + Seek>(reader: RS) -> Result<Table, TableError> {
        let mut workbook: Xlsx<RS> = Xlsx::new(reader).map_err(calamine::Error::from)?;
        first_sheet(&mut workbook)
    }

    /// Open a table file. Spreadsheets are read from their first sheet,
    /// `.gz` files are decompressed on the fly.
    pub fn open(path: &Path, delimiter: Option<u8>) -> Result<Table, TableError> {
        if is_spreadsheet(path) {
            let mut workbook = calamine::open_workbook_auto(path)?;
            let table = first_sheet(&mut workbook)?;
            tracing::debug!(path = %path.display(), rows = table.len(), columns = table.headers.len(), "loaded spreadsheet");
            return Ok(table);
        }

        let file = File::open(path).map_err(|e| TableError::IO(path.display().to_string(), e))?;
        let reader = BufReader::new(file);

        let is_gz = path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("gz"));
        let table = if is_gz {
            Table::from_reader(GzDecoder::new(reader), delimiter)?
        } else {
            Table::from_reader(reader, delimiter)?
        };

        tracing::debug!(path = %path.display(), rows = table.len(), columns = table.headers.len(), "loaded table");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a column holding the same value in every row.
    pub fn push_constant_column(&mut self, header: &str, value: &str) {
        self.headers.push(header.to_string());
        for row in self.rows.iter_mut() {
            row.push(value.to_string());
        }
    }

    /// Append a column with one value per row.
    pub fn push_column(&mut self, header: &str, values: Vec<String>) {
        self.headers.push(header.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }
}


#[cfg(test)]
mod tests {
    use std::io::Write;

    use std::io::Cursor;
    use std::path::Path;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use rust_xlsxwriter::Workbook;

    use crate::reconcile::TableError;
    use crate::reconcile::table::{is_spreadsheet, sniff_delimiter, Table};

    #[test]
    fn read_csv() {
        let table = Table::from_reader(&b"mag, depth\n7.5,10\n5.0,33\n"[..], None).unwrap();

        assert_eq!(vec!["mag", "depth"], table.headers);
        assert_eq!(vec![vec!["7.5", "10"], vec!["5.0", "33"]], table.rows);
        assert_eq!(2, table.len());
    }

    #[test]
    fn sniff() {
        assert_eq!(b',', sniff_delimiter(b"a,b,c\n1;2;3;4;5\n"));
        assert_eq!(b'\t', sniff_delimiter(b"a\tb\tc\n"));
        assert_eq!(b';', sniff_delimiter(b"a;b;c"));
        assert_eq!(b',', sniff_delimiter(b"single\n1\n"));
    }

    #[test]
    fn read_tsv_with_bom() {
        let table = Table::from_reader(&b"\xEF\xBB\xBFmag\tmagType\n6.1\tmw\n"[..], None).unwrap();
        assert_eq!(vec!["mag", "magType"], table.headers);
        assert_eq!(vec![vec!["6.1", "mw"]], table.rows);
    }

    #[test]
    fn explicit_delimiter() {
        let table = Table::from_reader(&b"mag;depth,km\n7.5;10,5\n"[..], Some(b';')).unwrap();
        assert_eq!(vec!["mag", "depth,km"], table.headers);
    }

    #[test]
    fn reject_empty() {
        assert!(matches!(Table::from_reader(&b""[..], None), Err(TableError::Empty)));
        assert!(matches!(Table::from_reader(&b" \n\n"[..], None), Err(TableError::Empty)));
    }

    #[test]
    fn reject_ragged_rows() {
        let result = Table::from_reader(&b"mag,depth\n7.5,10\n5.0\n"[..], None);
        assert!(matches!(result, Err(TableError::Csv(_))));
    }

    #[test]
    fn read_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(b"mag,gap\n6.0,45\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let decoder = flate2::read::GzDecoder::new(&compressed[..]);
        let table = Table::from_reader(decoder, None).unwrap();
        assert_eq!(vec![vec!["6.0", "45"]], table.rows);
    }

    #[test]
    fn append_columns() {
        let mut table = Table::new(vec!["mag".into()], vec![vec!["5".into()], vec!["6".into()]]);
        table.push_constant_column("gap", "50");
        table.push_column("alert", vec!["GREEN".into(), "RED".into()]);

        assert_eq!(vec!["mag", "gap", "alert"], table.headers);
        assert_eq!(vec![vec!["5", "50", "GREEN"], vec!["6", "50", "RED"]], table.rows);
    }

    fn workbook() -> Workbook {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "mag").unwrap();
        sheet.write_string(0, 1, "magType").unwrap();
        sheet.write_string(0, 2, " Depth ").unwrap();
        sheet.write_number(1, 0, 7.5).unwrap();
        sheet.write_string(1, 1, "mw").unwrap();
        sheet.write_number(1, 2, 10.).unwrap();
        sheet.write_number(2, 0, 5.25).unwrap();
        sheet.write_string(2, 1, "ml").unwrap();
        workbook
    }

    #[test]
    fn spreadsheet_extensions() {
        assert!(is_spreadsheet(Path::new("events.xlsx")));
        assert!(is_spreadsheet(Path::new("events.ODS")));
        assert!(!is_spreadsheet(Path::new("events.csv")));
        assert!(!is_spreadsheet(Path::new("events")));
    }

    #[test]
    fn read_xlsx() {
        let bytes = workbook().save_to_buffer().unwrap();
        let table = Table::from_xlsx(Cursor::new(bytes)).unwrap();

        assert_eq!(vec!["mag", "magType", "Depth"], table.headers);
        assert_eq!(vec![vec!["7.5", "mw", "10"], vec!["5.25", "ml", ""]], table.rows);
    }

    #[test]
    fn open_xlsx_file() {
        let path = std::env::temp_dir().join(format!("quake-alert-upload-{}.xlsx", std::process::id()));
        workbook().save(&path).unwrap();

        let table = Table::open(&path, None).unwrap();
        assert_eq!(2, table.len());
        assert_eq!("7.5", table.rows[0][0]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn reject_empty_workbook() {
        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        let bytes = workbook.save_to_buffer().unwrap();

        assert!(matches!(Table::from_xlsx(Cursor::new(bytes)), Err(TableError::Empty)));
    }
}
