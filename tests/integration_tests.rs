use dictfile::entry::{EntryContext, TYPE_KEY};
use dictfile::location::{FolderLocation, Location, LocationName};
use dictfile::{
    dict, from_str, from_str_with_options, load_dict, save_dict, to_string_with_options, to_value,
    DictFile, Dictionary, DuplicatePolicy, EntryBuilder, EntryParser, Error, NdArray, Number,
    ReadOptions, Result, StorageMisuse, Table, TableFormat, UnsupportedPolicy, Value,
    WriteOptions,
};
use serde::Serialize;
use std::sync::Arc;
use tempfile::TempDir;

fn plain() -> WriteOptions {
    WriteOptions::new().with_timestamp(false)
}

fn sample_table() -> Table {
    Table::from_f64_rows(&[vec![0.0, 1.5], vec![0.1, 1.75], vec![0.2, -2.0]])
}

#[test]
fn test_entry_lines_keep_insertion_order() {
    let data = dict!("a" => 1, "b/c" => 2);
    let text = to_string_with_options(&data, &plain()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["a\t1", "b/c\t2"]);
}

#[test]
fn test_root_key_stack() {
    let file = from_str("//g\nk\tv\n///\nk2\tv2\n").unwrap();
    let paths: Vec<String> = file
        .data
        .leaves()
        .into_iter()
        .map(|(path, _)| path.join("/"))
        .collect();
    assert_eq!(paths, vec!["g/k", "k2"]);
}

#[test]
fn test_nested_root_keys() {
    let file = from_str("//a\n//b\nx\t1\n///\ny\t2\n///\nz\t3\n").unwrap();
    assert_eq!(file.data.get("a/b/x"), Some(&Value::from(1)));
    assert_eq!(file.data.get("a/y"), Some(&Value::from(2)));
    assert_eq!(file.data.get("z"), Some(&Value::from(3)));
}

#[test]
fn test_strict_duplicates_fail() {
    let err = from_str("a\t1\na\tvalue2\n").unwrap_err();
    match err {
        Error::DuplicateKey { path, line } => {
            assert_eq!(path, "a");
            assert_eq!(line, 2);
        }
        other => panic!("expected duplicate key error, got {:?}", other),
    }
}

#[test]
fn test_permissive_duplicates_overwrite() {
    let options = ReadOptions::new().with_duplicates(DuplicatePolicy::Overwrite);
    let file = from_str_with_options("a\t1\na\tvalue2\n", &options).unwrap();
    assert_eq!(file.data.get("a"), Some(&Value::from("value2")));
}

#[test]
fn test_inline_table_round_trip() {
    let data = dict!("trace" => sample_table().with_columns(["t", "amp"]));
    let options = plain().with_table_format(TableFormat::Inline);
    let text = to_string_with_options(&data, &options).unwrap();
    assert!(text.contains("# table start\n# t\tamp\n0.0\t1.5\n"));

    let back = from_str(&text).unwrap();
    let table = back.data.get("trace").and_then(Value::as_table).unwrap();
    assert_eq!(table.shape(), (3, 2));
    assert_eq!(table, data.get("trace").and_then(Value::as_table).unwrap());
}

#[test]
fn test_handwritten_inline_block() {
    let text = "scan\n# table start\n# time, amp\n1, 2.5\n2, 3.5\n# table end\nafter\t1\n";
    let file = from_str(text).unwrap();
    let table = file.data.get("scan").and_then(Value::as_table).unwrap();
    assert_eq!(table.columns, vec!["time", "amp"]);
    assert_eq!(table.rows[1], vec![Value::from(2), Value::from(3.5)]);
    assert_eq!(file.data.get("after"), Some(&Value::from(1)));
}

#[test]
fn test_unterminated_table_block() {
    let err = from_str("t\n# table start\n1 2\n").unwrap_err();
    assert!(err.is_format_error());
}

#[test]
fn test_table_formats_agree() {
    let dir = TempDir::new().unwrap();
    let table = sample_table().with_columns(["t", "amp"]);
    let file = DictFile::new(dict!("scan/trace" => table.clone()));

    for format in [TableFormat::Inline, TableFormat::Text, TableFormat::Binary] {
        let mut location = FolderLocation::new(dir.path().join(format!("{:?}", format)));
        let name = LocationName::default();
        save_dict(&mut location, &name, &file, &plain().with_table_format(format)).unwrap();
        let back = load_dict(&mut location, &name, &ReadOptions::default()).unwrap();
        let read = back.data.get("scan/trace").and_then(Value::as_table).unwrap();
        assert_eq!(read.shape(), (3, 2), "{:?}", format);
        assert_eq!(read.rows, table.rows, "{:?}", format);
        assert!(location.list_open().is_empty());
    }
}

#[test]
fn test_binary_preamble_in_primary_artifact() {
    let dir = TempDir::new().unwrap();
    let mut location = FolderLocation::new(dir.path());
    let name = LocationName::default();
    let file = DictFile::new(dict!("trace" => sample_table()));
    save_dict(&mut location, &name, &file, &plain().with_table_format(TableFormat::Binary)).unwrap();
    assert!(dir.path().join("trace.bin").exists());

    let raw = load_dict(&mut location, &name, &ReadOptions::new().raw_entries()).unwrap();
    let preamble = raw.data.branch("trace/preamble").unwrap();
    assert_eq!(preamble.get("packing").and_then(Value::as_str), Some("flatten"));
    assert_eq!(preamble.get("nrows").and_then(Value::as_i64), Some(3));
    assert_eq!(preamble.get("ncols").and_then(Value::as_i64), Some(2));
    assert_eq!(raw.data.get("trace/file_path").and_then(Value::as_str), Some("trace.bin"));

    let parsed = load_dict(&mut location, &name, &ReadOptions::default()).unwrap();
    let table = parsed.data.get("trace").and_then(Value::as_table).unwrap();
    assert_eq!(table.shape(), (3, 2));
}

#[test]
fn test_overflowing_binary_preamble_is_format_error() {
    let dir = TempDir::new().unwrap();
    let mut location = FolderLocation::new(dir.path());
    let name = LocationName::default();
    let file = DictFile::new(dict!("t" => Table::new(vec![vec![Value::from(1), Value::from(2)]])));
    save_dict(&mut location, &name, &file, &plain().with_table_format(TableFormat::Binary)).unwrap();

    let primary = dir.path().join("content.dict");
    let text = std::fs::read_to_string(&primary).unwrap();
    let tampered = text
        .replace("t/preamble/nrows\t1", "t/preamble/nrows\t2305843009213693952")
        .replace("t/preamble/ncols\t2", "t/preamble/ncols\t8");
    assert_ne!(tampered, text);
    std::fs::write(&primary, tampered).unwrap();
    std::fs::write(dir.path().join("t.bin"), b"").unwrap();

    let err = load_dict(&mut location, &name, &ReadOptions::default()).unwrap_err();
    assert!(err.is_format_error(), "{}", err);
    assert!(location.list_open().is_empty());
}

#[test]
fn test_overflowing_array_shape_is_format_error() {
    let dir = TempDir::new().unwrap();
    let mut location = FolderLocation::new(dir.path());
    let name = LocationName::default();
    let array = NdArray::from_f64(vec![2], vec![1.0, 2.0]).unwrap();
    let file = DictFile::new(dict!("frame" => Value::Array(array)));
    save_dict(&mut location, &name, &file, &plain()).unwrap();

    let primary = dir.path().join("content.dict");
    let text = std::fs::read_to_string(&primary).unwrap();
    let tampered = text.replace("[2]", "[4294967296, 4294967296, 4294967296]");
    assert_ne!(tampered, text);
    std::fs::write(&primary, tampered).unwrap();

    let err = load_dict(&mut location, &name, &ReadOptions::default()).unwrap_err();
    assert!(err.is_format_error(), "{}", err);
}

#[test]
fn test_empty_table_inline() {
    let data = dict!("empty" => Table::new(Vec::new()));
    let text = to_string_with_options(&data, &plain()).unwrap();
    assert!(text.contains("empty/data\ttable\n# table start\n# table end\n"));

    let back = from_str(&text).unwrap();
    let table = back.data.get("empty").and_then(Value::as_table).unwrap();
    assert_eq!(table.shape(), (0, 0));
    assert!(table.columns.is_empty());
}

#[test]
fn test_empty_table_with_columns_text() {
    let dir = TempDir::new().unwrap();
    let mut location = FolderLocation::new(dir.path());
    let name = LocationName::default();
    let table = Table::new(Vec::new()).with_columns(["a", "b"]);
    let file = DictFile::new(dict!("empty" => table.clone()));
    save_dict(&mut location, &name, &file, &plain().with_table_format(TableFormat::Text)).unwrap();

    let back = load_dict(&mut location, &name, &ReadOptions::default()).unwrap();
    let read = back.data.get("empty").and_then(Value::as_table).unwrap();
    assert_eq!(read.shape(), (0, 2));
    assert_eq!(read, &table);
}

#[test]
fn test_nested_containers_expand() {
    let nested = Value::List(vec![
        Value::from(1),
        Value::List(vec![Value::from("x"), Value::Null]),
        Value::Map(vec![(Value::from(1), Value::List(vec![Value::from(2.5)]))]),
    ]);
    let mut data = Dictionary::new();
    data.set("nested", nested.clone());

    let text = to_string_with_options(&data, &plain()).unwrap();
    assert!(text.starts_with("nested/__type__\texpanded\n"));
    assert_eq!(from_str(&text).unwrap().data.get("nested"), Some(&nested));
}

#[test]
fn test_trailing_empty_container_elements_round_trip() {
    let nested = Value::List(vec![
        Value::List(vec![Value::List(vec![])]),
        Value::Dict(Dictionary::new()),
    ]);
    let mut data = Dictionary::new();
    data.set("nested", nested.clone());

    let text = to_string_with_options(&data, &plain()).unwrap();
    assert!(text.contains("nested/length\t2\n"));
    assert_eq!(from_str(&text).unwrap().data.get("nested"), Some(&nested));
}

#[test]
fn test_unrecognized_branch_stays_raw() {
    let text = "probe/__type__\tsomething_else\nprobe/gain\t2\n";
    let file = from_str(text).unwrap();
    let branch = file.data.branch("probe").unwrap();
    assert_eq!(branch.get(TYPE_KEY).and_then(Value::as_str), Some("something_else"));
    assert_eq!(branch.get("gain"), Some(&Value::from(2)));
}

#[test]
fn test_blobs_through_location() {
    let dir = TempDir::new().unwrap();
    let mut location = FolderLocation::new(dir.path());
    let name = LocationName::default();
    let array = NdArray::from_f64(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let mut data = Dictionary::new();
    data.set("frames/image", Value::Array(array.clone()));
    data.set("raw", Value::Bytes(vec![0, 159, 146, 150]));

    save_dict(&mut location, &name, &DictFile::new(data.clone()), &plain()).unwrap();
    let back = load_dict(&mut location, &name, &ReadOptions::default()).unwrap();
    assert_eq!(back.data.get("frames/image"), Some(&Value::Array(array)));
    assert_eq!(back.data.get("raw").and_then(Value::as_bytes), Some(&[0u8, 159, 146, 150][..]));
}

#[test]
fn test_blob_names_stay_inside_the_location() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store");
    let mut location = FolderLocation::new(&store);
    let name = LocationName::default();
    let array = NdArray::from_f64(vec![2], vec![1.0, 2.0]).unwrap();
    let mut data = Dictionary::new();
    data.insert_key("..", Value::Array(array.clone()));
    data.insert_key("a/b", Value::Bytes(vec![7]));

    save_dict(&mut location, &name, &DictFile::new(data.clone()), &plain()).unwrap();
    assert!(store.join("__.bin").exists());
    assert!(store.join("a_b.bin").exists());
    assert!(!dir.path().join(".bin").exists());

    let back = load_dict(&mut location, &name, &ReadOptions::default()).unwrap();
    assert_eq!(back.data, data);
}

#[test]
fn test_escaping_file_path_is_rejected_on_read() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store");
    std::fs::create_dir_all(&store).unwrap();
    std::fs::write(dir.path().join("secret.bin"), b"xyz").unwrap();
    std::fs::write(
        store.join("content.dict"),
        "raw/__type__\tblob\nraw/blob_type\tbytes\nraw/file_path\t\"../secret.bin\"\n",
    )
    .unwrap();

    let mut location = FolderLocation::new(&store);
    let err = load_dict(&mut location, &LocationName::default(), &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Storage(StorageMisuse::IllegalName(_))), "{}", err);
}

#[test]
fn test_unsupported_value_policy() {
    let data = dict!("raw" => Value::Bytes(vec![1, 2, 3]));
    let options = plain().with_registry(dictfile::EntryRegistry::empty());
    let err = to_string_with_options(&data, &options).unwrap_err();
    assert!(matches!(err, Error::UnsupportedValue { ref path, .. } if path == "raw"));

    let text = to_string_with_options(&data, &options.with_unsupported(UnsupportedPolicy::Stringify)).unwrap();
    assert_eq!(text, "raw\tBytes[3]\n");
}

/// Stores bytes as a hex string inside the branch.
#[derive(Debug)]
struct HexKind;

impl EntryBuilder for HexKind {
    fn is_value_mine(&self, value: &Value, _ctx: &EntryContext<'_>) -> bool {
        matches!(value, Value::Bytes(_))
    }

    fn to_branch(&self, value: &Value, _ctx: &mut EntryContext<'_>) -> Result<Dictionary> {
        let hex: String = value
            .as_bytes()
            .unwrap_or_default()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        let mut branch = Dictionary::new();
        branch.set(TYPE_KEY, Value::from("hex"));
        branch.set("digits", Value::from(hex));
        Ok(branch)
    }
}

impl EntryParser for HexKind {
    fn discriminator(&self) -> &str {
        "hex"
    }

    fn from_branch(&self, branch: &Dictionary, _ctx: &mut EntryContext<'_>) -> Result<Value> {
        let digits = branch
            .get("digits")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::missing_field("hex", "digits"))?;
        let bytes = (0..digits.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).map_err(Error::custom))
            .collect::<Result<Vec<u8>>>()?;
        Ok(Value::Bytes(bytes))
    }
}

#[test]
fn test_per_call_kind_wins() {
    let data = dict!("raw" => Value::Bytes(vec![0xde, 0xad]));
    let options = plain().with_builder(Arc::new(HexKind));
    let text = to_string_with_options(&data, &options).unwrap();
    assert_eq!(text, "raw/__type__\thex\nraw/digits\tdead\n");

    let back = from_str_with_options(&text, &ReadOptions::new().with_parser(Arc::new(HexKind))).unwrap();
    assert_eq!(back.data, data);

    let missing = from_str_with_options("x/__type__\thex\n", &ReadOptions::new().with_parser(Arc::new(HexKind)));
    assert!(matches!(missing, Err(Error::MissingField { .. })));
}

#[derive(Debug)]
struct FailingBuilder;

impl EntryBuilder for FailingBuilder {
    fn is_value_mine(&self, value: &Value, _ctx: &EntryContext<'_>) -> bool {
        matches!(value, Value::Bytes(_))
    }

    fn to_branch(&self, _value: &Value, _ctx: &mut EntryContext<'_>) -> Result<Dictionary> {
        Err(Error::custom("refused"))
    }
}

#[test]
fn test_failing_builder_leaves_data_untouched() {
    let data = dict!("a" => 1, "raw" => Value::Bytes(vec![1]), "z" => 2);
    let before = data.clone();
    let options = plain().with_builder(Arc::new(FailingBuilder));
    let err = to_string_with_options(&data, &options).unwrap_err();
    assert!(err.to_string().contains("refused"));
    assert_eq!(data, before);
}

#[derive(Serialize)]
struct Acquisition {
    operator: String,
    channels: Vec<u8>,
    settings: Settings,
}

#[derive(Serialize)]
struct Settings {
    gain: f64,
    averaging: Option<u32>,
}

#[test]
fn test_serde_bridge() {
    let acquisition = Acquisition {
        operator: "ada".to_string(),
        channels: vec![1, 4],
        settings: Settings {
            gain: 1.5,
            averaging: None,
        },
    };
    let value = to_value(&acquisition).unwrap();
    let Value::Dict(data) = value else {
        panic!("expected a dictionary");
    };
    let text = to_string_with_options(&data, &plain()).unwrap();
    assert_eq!(
        text,
        "operator\tada\nchannels\t[1, 4]\nsettings/gain\t1.5\nsettings/averaging\tNone\n"
    );

    let back = from_str(&text).unwrap();
    let json = serde_json::to_value(&back.data).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "operator": "ada",
            "channels": [1, 4],
            "settings": {"gain": 1.5, "averaging": null}
        })
    );

    let from_json: Value = serde_json::from_str(r#"{"a": [1, 2.5, "x"]}"#).unwrap();
    assert_eq!(
        from_json.as_dict().and_then(|d| d.get("a")),
        Some(&Value::List(vec![Value::from(1), Value::from(2.5), Value::from("x")]))
    );
}

#[test]
fn test_complex_and_special_literals() {
    let text = "z\t(1.5-2.0j)\ninf\tinf\nt\t(1,)\nq\t\"True\"\n";
    let file = from_str(text).unwrap();
    assert_eq!(file.data.get("z"), Some(&Value::Number(Number::Complex(1.5, -2.0))));
    assert_eq!(file.data.get("inf").and_then(Value::as_f64), Some(f64::INFINITY));
    assert_eq!(file.data.get("t"), Some(&Value::Tuple(vec![Value::from(1)])));
    assert_eq!(file.data.get("q"), Some(&Value::from("True")));

    let written = to_string_with_options(&file.data, &plain()).unwrap();
    assert_eq!(from_str(&written).unwrap().data, file.data);
}
