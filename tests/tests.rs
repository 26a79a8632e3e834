use std::io;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;

use csv_stream::{
    BufferedFieldSource, CharRead, Config, Encoding, Error, FieldSource,
    Reader, ReaderBuilder, RecordBuilder, Result as CsvResult,
};

/// Hands out at most `n` characters per read, whatever the buffer size.
struct Chunked {
    data: Vec<char>,
    pos: usize,
    n: usize,
}

impl Chunked {
    fn new(data: &str, n: usize) -> Chunked {
        Chunked { data: data.chars().collect(), pos: 0, n }
    }
}

impl CharRead for Chunked {
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let rest = &self.data[self.pos..];
        let n = self.n.min(buf.len()).min(rest.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

fn rows<S: FieldSource>(rdr: &mut Reader<S>) -> Vec<Vec<String>> {
    rdr.rows().collect::<Result<_, _>>().unwrap()
}

fn strs(rows: &[Vec<String>]) -> Vec<Vec<&str>> {
    rows.iter().map(|r| r.iter().map(|f| &**f).collect()).collect()
}

#[test]
fn round_trip_simple_row() {
    let fields = vec!["a", "b", "c"];
    let data = fields.join(",");
    let mut rdr = Reader::from_reader(data.as_bytes());
    assert_eq!(rdr.read_row().unwrap(), Some(vec!["a".into(), "b".into(), "c".into()]));
    assert_eq!(rdr.read_row().unwrap(), None);
}

#[test]
fn quoted_delimiter() {
    let mut rdr = Reader::from_reader("a,\"b,c\",d".as_bytes());
    assert_eq!(strs(&rows(&mut rdr)), vec![vec!["a", "b,c", "d"]]);
}

#[test]
fn doubled_quote() {
    let mut rdr = Reader::from_reader("\"a\"\"b\"".as_bytes());
    assert_eq!(strs(&rows(&mut rdr)), vec![vec!["a\"b"]]);
}

#[test]
fn multi_line_quoted_field() {
    let mut rdr = Reader::from_reader("\"line1\nline2\",x\nnext".as_bytes());
    let row = rdr.read_row().unwrap().unwrap();
    assert_eq!(row, vec!["line1\nline2", "x"]);
    assert_eq!(rdr.row(), 1);
    assert_eq!(rdr.raw_row(), rdr.row() + 1);
    rdr.read_row().unwrap().unwrap();
    assert_eq!(rdr.raw_row(), rdr.row() + 1);
}

#[test]
fn blank_line_between_rows() {
    let mut rdr = Reader::from_reader("a,b\n\nc,d\n".as_bytes());
    rdr.read_row().unwrap().unwrap();
    assert_eq!((rdr.row(), rdr.raw_row()), (1, 1));
    assert_eq!(rdr.read_row().unwrap(), Some(vec!["c".into(), "d".into()]));
    assert_eq!((rdr.row(), rdr.raw_row()), (2, 3));
}

#[test]
fn multi_char_delimiter() {
    let mut rdr = ReaderBuilder::new()
        .delimiter("::")
        .from_reader("a::b::c\na:b\n".as_bytes());
    assert_eq!(strs(&rows(&mut rdr)), vec![vec!["a", "b", "c"], vec!["a:b"]]);
}

#[test]
fn multi_char_delimiter_split_across_reads() {
    let data = "aa::bb::cc\n\"q\"::\"r\"\n";
    for n in 1..6 {
        for size in 1..6 {
            let mut rdr = ReaderBuilder::new()
                .delimiter("::")
                .buffer_size(size)
                .from_chars(Chunked::new(data, n));
            assert_eq!(
                strs(&rows(&mut rdr)),
                vec![vec!["aa", "bb", "cc"], vec!["q", "r"]],
                "chunk {} buffer {}",
                n,
                size,
            );
        }
    }
}

#[test]
fn no_trailing_newline() {
    let mut rdr = Reader::from_reader("a,b".as_bytes());
    assert_eq!(rdr.read_row().unwrap(), Some(vec!["a".into(), "b".into()]));
    assert_eq!(rdr.read_row().unwrap(), None);
    assert_eq!(rdr.read_row().unwrap(), None);
}

#[test]
fn bad_data_callback_continues() {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    let mut rdr = ReaderBuilder::new()
        .bad_data_callback(move |f| sink.lock().unwrap().push(f.to_string()))
        .from_reader("x,\"a\"b,y\nz\n".as_bytes());
    assert_eq!(strs(&rows(&mut rdr)), vec![vec!["x", "ab", "y"], vec!["z"]]);
    assert_eq!(*seen.lock().unwrap(), vec!["ab".to_string()]);
}

#[test]
fn bad_data_error_halts_row() {
    let mut rdr = Reader::from_reader("x,\"a\"b,y\nz\n".as_bytes());
    let err = rdr.read_row().unwrap_err();
    match err {
        Error::BadData { ref field, ref pos } => {
            assert_eq!(field, "ab");
            assert_eq!(pos.map(|p| p.row()), Some(1));
        }
        ref err => panic!("expected bad data, got {:?}", err),
    }
    assert!(err.to_string().starts_with("CSV bad data found at row 1"));
    assert_eq!(rdr.read_row().unwrap(), Some(vec!["z".into()]));
}

#[test]
fn raw_records_concatenate_to_input() {
    let data = "#note\na,\"b\r\nc\"\r\n\r\nd::e\r\"f\"\"\"\n\n";
    let mut rdr = ReaderBuilder::new()
        .allow_comments(true)
        .buffer_size(3)
        .from_reader(data.as_bytes());
    let mut raw = String::new();
    loop {
        let row = rdr.read_row().unwrap();
        raw.push_str(rdr.raw_record());
        if row.is_none() {
            break;
        }
    }
    assert_eq!(raw, data);
    assert_eq!(rdr.char_position(), data.chars().count() as u64);
}

#[test]
fn byte_positions_by_encoding() {
    let data = "\u{e9}\u{1F600},x\n";
    let expect = [
        (Encoding::Utf8, 9),
        (Encoding::Latin1, 5),
        (Encoding::Utf16Le, 12),
        (Encoding::Utf32Be, 20),
    ];
    for &(enc, bytes) in &expect {
        let mut rdr = ReaderBuilder::new()
            .count_bytes(true)
            .encoding(enc)
            .from_reader(data.as_bytes());
        rdr.read_row().unwrap().unwrap();
        assert_eq!(rdr.byte_position(), bytes, "{:?}", enc);
        assert_eq!(rdr.char_position(), 5);
    }
}

#[test]
fn excel_directive_then_rows() {
    let data = "sep=\t\r\nname\tvalue\r\n\"a\tb\"\t1\r\n";
    let mut rdr = ReaderBuilder::new()
        .has_excel_separator(true)
        .from_chars(Chunked::new(data, 2));
    assert_eq!(
        strs(&rows(&mut rdr)),
        vec![vec!["name", "value"], vec!["a\tb", "1"]]
    );
    assert_eq!(rdr.config().delimiter, "\t");
    assert_eq!((rdr.row(), rdr.raw_row()), (2, 3));
}

#[test]
fn read_record_matches_read_row() {
    let data = "a,b,c,d,e,f,g,h,i,j,k,l,m,n,o,p,q,r\n1,2\n";
    let mut rdr = Reader::from_reader(data.as_bytes());
    let mut rec = RecordBuilder::new();
    assert!(rdr.read_record(&mut rec).unwrap());
    assert_eq!(rec.len(), 18);
    assert_eq!(rec.capacity(), 32);
    assert!(rdr.read_record(&mut rec).unwrap());
    assert_eq!(rec.snapshot(), vec!["1", "2"]);
    assert!(!rdr.read_record(&mut rec).unwrap());
}

#[test]
fn closed_reader_reports_closed() {
    let mut rdr = Reader::from_reader("a\nb\n".as_bytes());
    rdr.read_row().unwrap();
    rdr.close();
    assert!(rdr.is_closed());
    match rdr.read_row() {
        Err(Error::Closed) => {}
        res => panic!("expected closed error, got {:?}", res),
    }
}

#[test]
fn from_path_reads_file() {
    let mut path = std::env::temp_dir();
    path.push(format!("csv-stream-test-{}.csv", std::process::id()));
    std::fs::write(&path, "a,b\r\nc,d\r\n").unwrap();
    let result = Reader::from_path(&path).map(|mut rdr| rows(&mut rdr));
    std::fs::remove_file(&path).unwrap();
    assert_eq!(strs(&result.unwrap()), vec![vec!["a", "b"], vec!["c", "d"]]);
}

#[test]
fn missing_file_is_io_error() {
    let err = Reader::from_path("/this/path/does/not/exist.csv").unwrap_err();
    assert!(err.is_io_error());
    assert!(err.position().is_none());
}

/// A field source that counts finished fields and otherwise defers to a
/// `BufferedFieldSource`.
struct CountingSource<R> {
    inner: BufferedFieldSource<R>,
    fields: usize,
}

impl<R: CharRead> FieldSource for CountingSource<R> {
    fn next_char(&mut self) -> CsvResult<Option<char>> {
        self.inner.next_char()
    }

    fn peek_char(&mut self) -> CsvResult<Option<char>> {
        self.inner.peek_char()
    }

    fn mark_field_start(&mut self, offset: isize) -> CsvResult<()> {
        self.inner.mark_field_start(offset)
    }

    fn mark_field_end(&mut self, offset: isize) -> CsvResult<()> {
        self.inner.mark_field_end(offset)
    }

    fn mark_field_bad(&mut self) -> CsvResult<()> {
        self.inner.mark_field_bad()
    }

    fn append_pending_field(&mut self) -> CsvResult<()> {
        self.inner.append_pending_field()
    }

    fn take_field(&mut self) -> CsvResult<String> {
        self.fields += 1;
        self.inner.take_field()
    }

    fn discard_field(&mut self) -> CsvResult<()> {
        self.inner.discard_field()
    }

    fn clear_raw_record(&mut self) -> CsvResult<()> {
        self.inner.clear_raw_record()
    }

    fn flush_raw_record(&mut self) -> CsvResult<()> {
        self.inner.flush_raw_record()
    }

    fn raw_record(&self) -> &str {
        self.inner.raw_record()
    }

    fn read_line(&mut self) -> CsvResult<Option<String>> {
        self.inner.read_line()
    }

    fn char_position(&self) -> u64 {
        self.inner.char_position()
    }

    fn byte_position(&self) -> u64 {
        self.inner.byte_position()
    }

    fn close(&mut self) {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[test]
fn reader_over_custom_source() {
    let data = "a::b::c\n\"x\"y::z\n";
    let config = Config { buffer_size: 2, ..Config::default() };
    let src = CountingSource {
        inner: BufferedFieldSource::new(Chunked::new(data, 3), &config),
        fields: 0,
    };
    // Byte counting and the bad data policy belong to the source, so these
    // builder settings have no effect here.
    let mut rdr = ReaderBuilder::new()
        .delimiter("::")
        .count_bytes(true)
        .bad_data_callback(|_| panic!("builder policy must not be used"))
        .from_source(src);
    assert_eq!(rdr.read_row().unwrap(), Some(vec!["a".into(), "b".into(), "c".into()]));
    assert_eq!(rdr.raw_record(), "a::b::c\n");
    // The source's own policy is the default, so the bad field errors.
    let err = rdr.read_row().unwrap_err();
    assert!(err.is_bad_data());
    assert_eq!(rdr.read_row().unwrap(), None);
    assert_eq!(rdr.byte_position(), 0);
    assert_eq!(rdr.char_position(), data.chars().count() as u64);
    assert_eq!(rdr.get_ref().fields, 5);
    assert_eq!(rdr.into_source().fields, 5);
}
