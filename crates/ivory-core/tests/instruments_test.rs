use ivory_core::InstrumentNameTable;
use ivory_ports::types::{Program, NUM_PROGRAMS};
use pretty_assertions::assert_eq;
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

fn program(value: u8) -> Program {
    Program::new(value).expect("program in range")
}

#[test]
fn short_file_is_padded_with_empty_names() {
    let table = InstrumentNameTable::from_reader(Cursor::new("Piano\nGuitar\nBass\n"));

    assert_eq!(table.len(), NUM_PROGRAMS);
    assert_eq!(table.name(program(0)), "Piano");
    assert_eq!(table.name(program(2)), "Bass");
    assert_eq!(table.name(program(3)), "");
    assert_eq!(table.name(program(127)), "");
}

#[test]
fn reading_stops_at_first_blank_line() {
    let table = InstrumentNameTable::from_reader(Cursor::new("Piano\n   \nGuitar\n"));

    assert_eq!(table.get(0), Some("Piano"));
    assert_eq!(table.get(1), Some(""));
    assert!(table.iter().all(|name| name != "Guitar"));
}

#[test]
fn extra_lines_beyond_128_are_ignored() {
    let text: String = (0..200).map(|i| format!("Instrument {}\n", i)).collect();
    let table = InstrumentNameTable::from_reader(Cursor::new(text));

    assert_eq!(table.len(), NUM_PROGRAMS);
    assert_eq!(table.name(Program::LAST), "Instrument 127");
    assert_eq!(table.get(128), None);
}

#[test]
fn invalid_utf8_is_replaced_not_fatal() {
    let bytes: &[u8] = b"Piano\r\nGuitar\nBass \xe9\nOrgan\n";
    let table = InstrumentNameTable::from_reader(Cursor::new(bytes));

    assert_eq!(table.get(0), Some("Piano"));
    assert_eq!(table.get(1), Some("Guitar"));
    assert_eq!(table.get(2), Some("Bass \u{FFFD}"));
    assert_eq!(table.get(3), Some("Organ"));
    assert_eq!(table.get(4), Some(""));
}

/// Serves `data` once, then fails every read.
struct FailingAfter {
    data: Cursor<Vec<u8>>,
}

impl Read for FailingAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::Other, "disk went away")),
            n => Ok(n),
        }
    }
}

#[test]
fn read_error_keeps_names_read_so_far() {
    let reader = BufReader::new(FailingAfter {
        data: Cursor::new(b"Piano\nGuitar\nBa".to_vec()),
    });
    let table = InstrumentNameTable::from_reader(reader);

    assert_eq!(table.len(), NUM_PROGRAMS);
    assert_eq!(table.get(0), Some("Piano"));
    assert_eq!(table.get(1), Some("Guitar"));
    assert_eq!(table.get(2), Some(""));
}

#[test]
fn missing_file_yields_blank_table() {
    let path = Path::new("does/not/exist/instruments.txt");
    assert!(InstrumentNameTable::load(path).is_err());

    let table = InstrumentNameTable::load_or_blank(path);
    assert_eq!(table, InstrumentNameTable::blank());
    for id in 0..NUM_PROGRAMS {
        assert_eq!(table.get(id), Some(""));
    }
}

#[test]
fn bundled_resource_names_every_program() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../resources/data/instruments.txt");
    let table = InstrumentNameTable::load(&path).expect("bundled resource should load");

    assert_eq!(table.name(Program::ACOUSTIC_GRAND_PIANO), "Acoustic Grand Piano");
    assert_eq!(table.name(Program::LAST), "Gunshot");
    assert!(table.iter().all(|name| !name.is_empty()));
}
