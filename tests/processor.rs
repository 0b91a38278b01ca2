mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use common::{Basic, Grade, basic_processor, basic_schema};
use csv_mapper::{
    CellContext, Column, ColumnSchema, ConfigError, Converter, CsvError, CsvOptions,
    CsvProcessor, ErrorKind, ParseError, ReadOutcome,
    converter::EnumConverter,
    flags,
    header::NormalizedMatcher,
    io_utils::{IterLines, LineReader, LineWriter},
};
use encoding_rs::UTF_8;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

fn basic(int_value: i32, string: &str, long_value: i64, unquoted: &str) -> Basic {
    Basic {
        int_value,
        string: string.to_string(),
        long_value,
        unquoted: unquoted.to_string(),
    }
}

#[test]
fn doubled_quotes_inside_quoted_cell_are_unescaped() {
    let processor = basic_processor(CsvOptions::default());
    let row = processor
        .parse_row(r#"1,"a""b",2,u"#, 2, None)
        .expect("parse")
        .expect("row");
    assert_eq!(row, basic(1, "a\"b", 2, "u"));
    assert_eq!(processor.build_row(&row), r#"1,"a""b",2,u"#);
}

#[test]
fn unquoted_column_builds_back_exactly() {
    let processor = basic_processor(CsvOptions::default());
    let line = r#"1,"x",2,u"#;
    let row = processor.parse_row(line, 2, None).unwrap().unwrap();
    assert_eq!(processor.build_row(&row), line);

    let awkward = basic(1, "x", 2, "a,b");
    assert_eq!(processor.build_row(&awkward), r#"1,"x",2,"a,b""#);
}

#[test]
fn header_order_is_strict_unless_flexible() {
    let header = "string,intValue,longValue,unquoted";
    let lines = vec![header, r#""a",1,2,u"#];

    let mut strict = basic_processor(CsvOptions::default());
    let mut error = ParseError::new();
    let outcome = strict
        .read_row(&mut IterLines::new(lines.clone()), Some(&mut error))
        .unwrap();
    assert_eq!(outcome, ReadOutcome::Invalid);
    assert_eq!(error.kind, ErrorKind::InvalidHeader);
    assert_eq!(error.line_number, 1);
    assert_eq!(error.column.as_deref(), Some("intValue"));
    assert!(strict.positions().is_declaration_order());

    let mut flexible = basic_processor(CsvOptions::default().with_flexible_order(true));
    let rows = flexible
        .read_all(&mut IterLines::new(lines), None)
        .unwrap();
    assert_eq!(rows, vec![basic(1, "a", 2, "u")]);
}

#[test]
fn short_rows_need_partial_lines() {
    let mut strict = basic_processor(CsvOptions::default());
    let err = strict
        .read_all(&mut IterLines::new(vec!["intValue,string,longValue,unquoted", "1,\"a\""]), None)
        .unwrap_err();
    match err {
        CsvError::Parse(error) => {
            assert_eq!(error.kind, ErrorKind::TooFewColumns);
            assert_eq!(error.line_number, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }

    let mut partial = basic_processor(CsvOptions::default().with_partial_lines(true));
    let rows = partial
        .read_all(&mut IterLines::new(vec!["intValue,string,longValue,unquoted", "1,\"a\""]), None)
        .unwrap();
    assert_eq!(rows, vec![basic(1, "a", 0, "")]);
}

proptest! {
    #[test]
    fn collect_mode_keeps_valid_rows_and_reports_the_bad_line(
        valid in 0usize..50,
        with_header in any::<bool>(),
    ) {
        let mut lines = Vec::new();
        if with_header {
            lines.push("intValue,string,longValue,unquoted".to_string());
        }
        for i in 0..valid {
            lines.push(format!("{i},\"s{i}\",{},u", i * 10));
        }
        lines.push("oops,\"s\",1,u".to_string());

        let mut processor = basic_processor(CsvOptions::default().with_header(with_header));
        let mut errors = Vec::new();
        let rows = processor
            .read_all(&mut IterLines::new(lines), Some(&mut errors))
            .unwrap();
        prop_assert_eq!(rows.len(), valid);
        prop_assert_eq!(errors.len(), 1);
        prop_assert_eq!(errors[0].line_number, valid + 1 + usize::from(with_header));
        prop_assert_eq!(errors[0].kind, ErrorKind::InvalidFormat);
        prop_assert_eq!(errors[0].column.as_deref(), Some("intValue"));
        prop_assert_eq!(errors[0].cell.as_deref(), Some("oops"));
        prop_assert_eq!(errors[0].offset, 0);
    }
}

#[test]
fn quoted_line_breaks_survive_a_file_round_trip() {
    let writer = basic_processor(CsvOptions::default().with_line_terminator("\r\n"));
    let records = vec![
        basic(1, "line\nbreak", 10, "u"),
        basic(2, "two\n\nbreaks", 20, "v"),
        basic(3, "plain", 30, "w"),
    ];
    let mut sink = LineWriter::new(Vec::new(), UTF_8);
    writer.write_all(&mut sink, &records).unwrap();
    let bytes = sink.into_inner();
    assert!(String::from_utf8_lossy(&bytes).contains("\"line\nbreak\""));

    let mut reader = basic_processor(CsvOptions::default());
    let mut errors = Vec::new();
    let back = reader
        .read_all(&mut LineReader::new(bytes.as_slice()), Some(&mut errors))
        .unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(back, records);
    assert_eq!(reader.line_number(), 7);
}

#[test]
fn unclosed_quote_is_reported_at_its_first_line() {
    let text = "intValue,string,longValue,unquoted\n1,\"a\nb\",1,u\n2,\"c,2,u\n3,d,3,u\n";
    let mut reader = basic_processor(CsvOptions::default());
    let mut errors = Vec::new();
    let rows = reader
        .read_all(&mut LineReader::new(text.as_bytes()), Some(&mut errors))
        .unwrap();
    assert_eq!(rows, vec![basic(1, "a\nb", 1, "u")]);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::TruncatedColumn);
    assert_eq!(errors[0].line_number, 4);
    assert_eq!(errors[0].offset, 2);
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Reading {
    value: Option<i32>,
}

fn reading_processor() -> CsvProcessor<Reading> {
    let schema = ColumnSchema::builder()
        .default_factory()
        .column(
            Column::<Reading, i32>::new("n")
                .get(|r| r.value)
                .set(|r, v| r.value = Some(v)),
        )
        .build()
        .unwrap();
    CsvProcessor::new(Arc::new(schema), CsvOptions::default()).unwrap()
}

#[test]
fn single_column_absent_values_are_not_lost() {
    let records = vec![
        Reading { value: Some(1) },
        Reading { value: None },
        Reading { value: Some(3) },
    ];
    let writer = reading_processor();
    let mut lines: Vec<String> = Vec::new();
    writer.write_all(&mut lines, &records).unwrap();
    assert_eq!(lines, vec!["\"n\"", "1", "\"\"", "3"]);

    let mut reader = reading_processor();
    let back = reader.read_all(&mut IterLines::new(lines), None).unwrap();
    assert_eq!(back, records);

    assert_eq!(writer.parse_row("", 1, None).unwrap(), Some(Reading { value: None }));
}

#[test]
fn missing_header_and_empty_input() {
    let mut processor = basic_processor(CsvOptions::default());
    let err = processor
        .read_all(&mut IterLines::new(Vec::<String>::new()), None)
        .unwrap_err();
    assert!(matches!(err, CsvError::Parse(ref e) if e.kind == ErrorKind::NoHeader));

    let mut headerless = basic_processor(CsvOptions::default().with_header(false));
    let rows = headerless
        .read_all(&mut IterLines::new(Vec::<String>::new()), None)
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn written_output_reads_back() {
    let processor = basic_processor(CsvOptions::default().with_line_terminator("\r\n"));
    let records = vec![
        basic(1, "plain", 10, "u"),
        basic(-2, "with \"quotes\", commas", i64::MIN, "x"),
        basic(3, "", 0, "tab\there"),
    ];
    let mut lines: Vec<String> = Vec::new();
    assert_eq!(processor.write_all(&mut lines, &records).unwrap(), 3);
    assert_eq!(lines[0], r#""intValue","string","longValue","unquoted""#);

    let mut reader = basic_processor(CsvOptions::default());
    let back = reader.read_all(&mut IterLines::new(lines), None).unwrap();
    assert_eq!(back, records);
}

#[test]
fn custom_separator_and_quote() {
    let options = CsvOptions::default().with_separator(';').with_quote('\'');
    let mut processor = basic_processor(options);
    let rows = processor
        .read_all(
            &mut IterLines::new(vec!["'intValue';string;longValue;unquoted", "1;'it''s;ok';2;u"]),
            None,
        )
        .unwrap();
    assert_eq!(rows, vec![basic(1, "it's;ok", 2, "u")]);
    assert_eq!(processor.build_row(&rows[0]), "1;'it''s;ok';2;u");
}

#[test]
fn unknown_header_columns_can_be_ignored() {
    let mut processor = basic_processor(CsvOptions::default().with_ignore_unknown_columns(true));
    let rows = processor
        .read_all(
            &mut IterLines::new(vec![
                "intValue,comment,string,longValue,unquoted",
                "1,\"ignored, really\",\"s\",2,u,trailing",
            ]),
            None,
        )
        .unwrap();
    assert_eq!(rows, vec![basic(1, "s", 2, "u")]);
}

#[test]
fn processors_share_one_schema_across_threads() {
    let schema = Arc::new(basic_schema());
    std::thread::scope(|scope| {
        for worker in 0..4 {
            let schema = Arc::clone(&schema);
            scope.spawn(move || {
                let mut processor = CsvProcessor::new(schema, CsvOptions::default()).unwrap();
                let lines = vec![
                    "intValue,string,longValue,unquoted".to_string(),
                    format!("{worker},\"w\",{worker},u"),
                ];
                let rows = processor.read_all(&mut IterLines::new(lines), None).unwrap();
                assert_eq!(rows[0].int_value, worker);
            });
        }
    });
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Employee {
    id: u32,
    name: String,
    grade: Grade,
    active: bool,
    hired: Option<NaiveDate>,
    salary: Decimal,
    badge: Option<Uuid>,
    nickname: Option<String>,
}

fn employee_schema() -> ColumnSchema<Employee> {
    let mut builder = ColumnSchema::builder().default_factory();
    builder.registry_mut().register_enum::<Grade>();
    builder
        .column(
            Column::<Employee, u32>::new("id")
                .required()
                .get(|e| Some(e.id))
                .set(|e, v| e.id = v),
        )
        .column(
            Column::<Employee, String>::new("name")
                .not_blank()
                .trim()
                .get(|e| Some(e.name.clone()))
                .set(|e, v| e.name = v),
        )
        .column(
            Column::<Employee, Grade>::new("grade")
                .default_value("junior")
                .get(|e| Some(e.grade))
                .set(|e, v| e.grade = v),
        )
        .column(
            Column::<Employee, bool>::new("active")
                .format("Y|N")
                .flags(flags::STRICT)
                .get(|e| Some(e.active))
                .set(|e, v| e.active = v),
        )
        .column(
            Column::<Employee, NaiveDate>::new("hired")
                .format("%d.%m.%Y")
                .get(|e| e.hired)
                .set(|e, v| e.hired = Some(v)),
        )
        .column(
            Column::<Employee, Decimal>::new("salary")
                .format("#,##0.00")
                .get(|e| Some(e.salary))
                .set(|e, v| e.salary = v),
        )
        .column(
            Column::<Employee, Uuid>::new("badge")
                .after("id")
                .get(|e| e.badge)
                .set(|e, v| e.badge = Some(v)),
        )
        .column(
            Column::<Employee, String>::new("nickname")
                .flags(flags::BLANK_IS_NULL)
                .get(|e| e.nickname.clone())
                .set(|e, v| e.nickname = Some(v)),
        )
        .build()
        .expect("employee schema")
}

#[test]
fn typed_records_round_trip_through_every_converter() {
    let schema = Arc::new(employee_schema());
    assert_eq!(
        schema.names(),
        vec!["id", "badge", "name", "grade", "active", "hired", "salary", "nickname"]
    );
    let processor = CsvProcessor::new(Arc::clone(&schema), CsvOptions::default()).unwrap();
    assert_eq!(
        processor.build_header_line(),
        r#""id","badge","name","grade","active","hired","salary","nickname""#
    );

    let badge = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
    let line = "7,67e55044-10b1-426f-9247-bb680e5fe0c8,  Ada  , SENIOR ,y,01.02.2020,\"12,345.60\",";
    let employee = processor.parse_row(line, 2, None).unwrap().unwrap();
    assert_eq!(
        employee,
        Employee {
            id: 7,
            name: "Ada".to_string(),
            grade: Grade::Senior,
            active: true,
            hired: NaiveDate::from_ymd_opt(2020, 2, 1),
            salary: Decimal::new(1_234_560, 2),
            badge: Some(badge),
            nickname: None,
        }
    );
    assert_eq!(
        processor.build_row(&employee),
        "7,67e55044-10b1-426f-9247-bb680e5fe0c8,\"Ada\",senior,Y,01.02.2020,\"12,345.60\","
    );
}

#[test]
fn defaults_blank_checks_and_strict_booleans() {
    let processor = CsvProcessor::new(Arc::new(employee_schema()), CsvOptions::default()).unwrap();
    let mut error = ParseError::new();

    let employee = processor
        .parse_row("1,,\"Bo\",,N,,0.00,\"Bobby\"", 2, Some(&mut error))
        .unwrap()
        .unwrap();
    assert_eq!(employee.grade, Grade::Junior);
    assert_eq!(employee.hired, None);
    assert_eq!(employee.nickname.as_deref(), Some("Bobby"));

    assert!(processor.parse_row("1,,\"  \",,N,,0,", 3, Some(&mut error)).unwrap().is_none());
    assert_eq!(error.kind, ErrorKind::MustNotBeBlank);
    assert_eq!(error.column.as_deref(), Some("name"));
    assert_eq!(error.offset, 3);

    assert!(processor.parse_row("1,,Bo,,maybe,,0,", 4, Some(&mut error)).unwrap().is_none());
    assert_eq!(error.kind, ErrorKind::InvalidFormat);
    assert_eq!(error.column.as_deref(), Some("active"));
    assert_eq!(error.expected_type.as_deref(), Some("bool"));

    assert!(processor.parse_row("1,,Bo,wizard,N,,0,", 5, Some(&mut error)).unwrap().is_none());
    assert_eq!(error.column.as_deref(), Some("grade"));
}

#[test]
fn required_columns_must_be_in_the_header() {
    let mut processor = CsvProcessor::new(
        Arc::new(employee_schema()),
        CsvOptions::default().with_partial_lines(true),
    )
    .unwrap();
    let mut error = ParseError::new();
    let outcome = processor
        .read_row(&mut IterLines::new(vec!["name,grade", "Ada,senior"]), Some(&mut error))
        .unwrap();
    assert_eq!(outcome, ReadOutcome::Invalid);
    assert_eq!(error.kind, ErrorKind::InvalidHeader);
    assert!(error.message.contains("id"), "{}", error.message);
}

#[test]
fn pluggable_matcher_and_per_column_converter() {
    let schema = ColumnSchema::builder()
        .default_factory()
        .column(
            Column::<Employee, u32>::new("employeeId")
                .set(|e, v| e.id = v),
        )
        .column(
            Column::<Employee, Grade>::new("payGrade")
                .converter(EnumConverter::<Grade>::new())
                .format("junior")
                .flags(flags::FALLBACK)
                .set(|e, v| e.grade = v),
        )
        .build()
        .unwrap();
    let mut processor = CsvProcessor::new(Arc::new(schema), CsvOptions::default())
        .unwrap()
        .with_matcher(NormalizedMatcher);
    let rows = processor
        .read_all(
            &mut IterLines::new(vec!["Employee ID,pay_grade", "4,principal", "5,intern"]),
            None,
        )
        .unwrap();
    assert_eq!(rows[0].grade, Grade::Principal);
    assert_eq!(rows[1].grade, Grade::Junior);
}

struct Exploding;

impl Converter for Exploding {
    type Value = i32;
    type Config = ();

    fn configure(&self, _format: Option<&str>, _flags: u32) -> Result<(), ConfigError> {
        Ok(())
    }

    fn needs_quoting(&self, _config: &()) -> bool {
        false
    }

    fn to_text(&self, _config: &(), value: &i32) -> Option<String> {
        Some(value.to_string())
    }

    fn from_text(&self, cell: &CellContext<'_>, _config: &(), _error: &mut ParseError) -> Option<i32> {
        if cell.text == "boom" {
            panic!("converter exploded");
        }
        cell.text.parse().ok()
    }
}

#[test]
fn converter_panics_and_setter_errors_become_internal_errors() {
    let schema = ColumnSchema::builder()
        .default_factory()
        .column(
            Column::<Basic, i32>::new("intValue")
                .converter(Exploding)
                .set(|r, v| r.int_value = v),
        )
        .column(
            Column::<Basic, i64>::new("longValue").try_set(|r, v| {
                if v < 0 {
                    return Err("negative values are not accepted".into());
                }
                r.long_value = v;
                Ok(())
            }),
        )
        .build()
        .unwrap();
    let processor = CsvProcessor::new(Arc::new(schema), CsvOptions::default().with_header(false)).unwrap();
    let mut error = ParseError::new();

    assert!(processor.parse_row("boom,1", 1, Some(&mut error)).unwrap().is_none());
    assert_eq!(error.kind, ErrorKind::InternalError);
    assert!(error.message.contains("converter exploded"), "{}", error.message);

    assert!(processor.parse_row("1,-5", 2, Some(&mut error)).unwrap().is_none());
    assert_eq!(error.kind, ErrorKind::InternalError);
    assert_eq!(error.column.as_deref(), Some("longValue"));
    assert_eq!(error.offset, 2);

    let row = processor.parse_row("3,4", 3, Some(&mut error)).unwrap().unwrap();
    assert_eq!((row.int_value, row.long_value), (3, 4));
    assert!(!error.is_error());
}

#[test]
fn truncated_quotes_are_reported_at_cell_start() {
    let processor = basic_processor(CsvOptions::default());
    let mut error = ParseError::new();
    assert!(processor.parse_row("1,\"abc,2,u", 9, Some(&mut error)).unwrap().is_none());
    assert_eq!(error.kind, ErrorKind::TruncatedColumn);
    assert_eq!(error.offset, 2);
    assert_eq!(error.line_number, 9);
    assert_eq!(error.column.as_deref(), Some("string"));
}
