/*!
The `csv-stream` crate provides a streaming CSV row tokenizer that tracks
where every row came from.

Rows are read one at a time as `Vec<String>`. Alongside each row, the reader
keeps the logical row number, the physical line number, the character and
(optionally) byte offset of the stream, and the verbatim text the row was
parsed from.

# Brief overview

The primary type in this crate is [`Reader`](struct.Reader.html). It is
built with a [`ReaderBuilder`](struct.ReaderBuilder.html), which exposes the
knobs of [`Config`](struct.Config.html):

* a delimiter of any length, such as `,` or `::`,
* a quote character, escaped by doubling it inside quoted fields,
* comment lines and blank lines, skipped or returned as empty rows,
* an Excel `sep=` directive on the first line that replaces the delimiter,
* a [`BadDataPolicy`](enum.BadDataPolicy.html) for malformed quoted fields.

`\n`, `\r\n` and a lone `\r` all end a row, and may be mixed freely.

Internally, a reader is layered on top of a
[`FieldSource`](trait.FieldSource.html), which buffers characters from a
[`CharRead`](trait.CharRead.html). The default source,
[`BufferedFieldSource`](struct.BufferedFieldSource.html), reads through a
fixed size window, but fields and records may be of any length.

# Example

```
use csv_stream::ReaderBuilder;

# fn example() -> csv_stream::Result<()> {
let data = "\
sep=;
city;population
\"Boston, MA\";4628910
";
let mut rdr = ReaderBuilder::new()
    .has_excel_separator(true)
    .from_reader(data.as_bytes());
while let Some(row) = rdr.read_row()? {
    println!("row {} at line {}: {:?}", rdr.row(), rdr.raw_row(), row);
}
assert_eq!(rdr.row(), 2);
assert_eq!(rdr.raw_record(), "\"Boston, MA\";4628910\n");
# Ok(()) }
# example().unwrap();
```

# Logging

This crate emits [`tracing`](https://docs.rs/tracing) events: `trace` for
buffer refills and skipped lines, `debug` when the Excel directive changes
the delimiter or a bad field is passed to a callback, and `warn` when an
expected directive is missing or malformed. Nothing is printed unless a
subscriber is installed.
*/

#![deny(missing_docs)]

pub use crate::chars::{CharRead, Utf8Chars};
pub use crate::config::{BadDataPolicy, Config, DEFAULT_BUFFER_SIZE};
pub use crate::encoding::Encoding;
pub use crate::error::{Error, Result};
pub use crate::position::Position;
pub use crate::reader::{Reader, ReaderBuilder, RowsIter};
pub use crate::record::RecordBuilder;
pub use crate::source::{BufferedFieldSource, FieldSource};

mod chars;
mod config;
mod encoding;
mod error;
mod position;
mod reader;
mod record;
mod source;
