use std::fs;

use arch::image::{self, code_start};
use indoc::indoc;
use tvmasm::{Abort, Assembler, Assembly, Error};

fn case(code: &str) -> Assembly {
    println!("{code}");
    let asm = Assembler::assemble_str("case.s", code).unwrap();
    asm.report.print();
    asm
}

fn word(image: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([image[at], image[at + 1], image[at + 2], image[at + 3]])
}

#[test]
fn add_program_bytes() {
    let asm = case(indoc! {"
        start:
            pushb 5
            pushb 3
            add     ; 5 + 3
            saynum
            exit
    "});
    assert_eq!(asm.error_count(), 0);
    assert_eq!(&asm.image[..4], b"TVM\0");
    assert_eq!(word(&asm.image, 12), 0);
    assert_eq!(&asm.image[16..], &[2, 5, 2, 3, 11, 19, 0]);
    assert_eq!(asm.labels.get_val("start"), Some(16));
}

#[test]
fn deterministic() {
    let code = indoc! {"
        .export start
        start:
            pushw message
            saystr
            exit
        message:
            .string \"hello\"
    "};
    let a = case(code);
    let b = case(code);
    assert_eq!(a.image, b.image);
}

#[test]
fn forward_reference() {
    let asm = case(indoc! {"
            pushw target
            exit
        target:
            exit
    "});
    assert_eq!(asm.error_count(), 0);
    assert_eq!(asm.labels.get_val("target"), Some(22));
    assert_eq!(word(&asm.image, 17), 22);
}

#[test]
fn narrow_forward_reference_keeps_next_byte() {
    let asm = case(indoc! {"
            pushb later
            saynum
        later:
            exit
    "});
    assert_eq!(asm.error_count(), 0);
    assert_eq!(&asm.image[16..], &[2, 19, 19, 0]);
}

#[test]
fn label_shares_line_with_statement() {
    let asm = case("top: pushw top\nexit\n");
    assert_eq!(asm.error_count(), 0);
    assert_eq!(word(&asm.image, 17), 16);
}

#[test]
fn duplicate_label() {
    let asm = case(indoc! {"
        a:
            exit
        a:
            exit
    "});
    assert_eq!(asm.error_count(), 1);
    assert!(matches!(asm.report.errors().next(), Some(Error::RedefinedLabel(name)) if name == "a"));
    assert_eq!(asm.labels.get_val("a"), Some(16));
    assert_eq!(asm.labels.get("a").unwrap().pos.line, 1);
}

#[test]
fn undefined_symbol_leaves_sentinel() {
    let asm = case("pushw nowhere\nexit\n");
    assert_eq!(asm.error_count(), 1);
    assert!(matches!(asm.report.errors().next(), Some(Error::UndefinedSymbol(name)) if name == "nowhere"));
    assert_eq!(&asm.image[17..21], &[0xFF; 4]);
}

#[test]
fn data_directives() {
    let asm = case(indoc! {"
        .define COUNT 3
        .string \"hi\"
        .byte 1 255 -128
        .short 0x1234
        .word -1
        .zero COUNT_IS_NOT_ALLOWED
        .zero 3
    "});
    assert_eq!(asm.error_count(), 1);
    assert_eq!(
        &asm.image[16..],
        &[b'h', b'i', 0, 1, 255, 128, 0x34, 0x12, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0]
    );
    assert_eq!(asm.labels.get_val("COUNT"), Some(3));
}

#[test]
fn constants_as_operands() {
    let asm = case(indoc! {"
        .define LIMIT 0x1000
            pushs LIMIT
            exit
    "});
    assert_eq!(asm.error_count(), 0);
    assert_eq!(&asm.image[16..], &[3, 0x00, 0x10, 0]);
}

#[test]
fn range_checks() {
    let asm = case(indoc! {"
            pushb 300
            pushb -1
            pushs 70000
        .byte 256
        .zero -1
        .tileinfo 65 256
    "});
    let errors: Vec<_> = asm.report.errors().collect();
    assert_eq!(errors.len(), 5, "{errors:?}");
    assert!(matches!(errors[0], Error::OutOfRange(300, 1)));
    assert!(matches!(errors[1], Error::OutOfRange(70000, 2)));
    assert!(matches!(errors[2], Error::OutOfRange(256, 1)));
    assert!(matches!(errors[3], Error::BadCount(-1)));
    assert!(matches!(errors[4], Error::HeaderOrder(_)));
}

#[test]
fn operand_errors_recover() {
    let asm = case(indoc! {"
            hoge
            exit 5
            pushb
            pushb 1 2
            pushw \"text\"
            saynum
    "});
    let errors: Vec<_> = asm.report.errors().collect();
    assert_eq!(errors.len(), 5, "{errors:?}");
    assert!(matches!(errors[0], Error::UnknownMnemonic(_)));
    assert!(matches!(errors[1], Error::UnexpectedOperand(_)));
    assert!(matches!(errors[2], Error::MissingOperand(_)));
    assert!(matches!(errors[3], Error::Expected("end-of-line", _)));
    assert!(matches!(errors[4], Error::BadOperand(_)));
    assert_eq!(asm.image.last(), Some(&19));
}

#[test]
fn header_order() {
    let asm = case(indoc! {"
            exit
        .export start
        start:
            exit
    "});
    assert_eq!(asm.error_count(), 1);
    assert!(matches!(asm.report.errors().next(), Some(Error::HeaderOrder(name)) if name == ".export"));
    assert_eq!(word(&asm.image, 12), 0);
}

#[test]
fn export_table() {
    let asm = case(indoc! {"
        .export start
        start:
            exit
    "});
    assert_eq!(asm.error_count(), 0);
    assert_eq!(word(&asm.image, 12), 1);
    assert_eq!(image::find_export(&asm.image, "start").unwrap(), Some(36));
    assert_eq!(asm.image[36], 0);
}

#[test]
fn long_export_name_is_truncated_with_warning() {
    let asm = case(indoc! {"
        .export averyveryverylongname1
        averyveryverylongname1:
            exit
    "});
    assert_eq!(asm.error_count(), 0);
    assert_eq!(asm.report.diags.len(), 1);
    assert!(matches!(asm.report.diags[0].error, Error::ExportTruncated(..)));
    let exports = image::exports(&asm.image).unwrap();
    assert_eq!(exports[0].name, "averyveryverylon");
    assert_eq!(exports[0].addr as usize, code_start(1));
}

#[test]
fn export_of_undefined_name() {
    let asm = case(".export missing\nexit\n");
    assert_eq!(asm.error_count(), 1);
    assert_eq!(word(&asm.image, 32), u32::MAX);
}

#[test]
fn mapdata_then_export() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("map.txt"), "#.#\n...\n\n").unwrap();
    let main = dir.path().join("main.s");
    fs::write(
        &main,
        indoc! {"
            .tileinfo '#' 1
            .tileinfo '.' 2
            .mapdata \"map.txt\"
            .export
                mapdata
                start
            start:
                exit
        "},
    )
    .unwrap();

    let asm = Assembler::assemble_file(&main).unwrap();
    asm.report.print();
    assert_eq!(asm.error_count(), 0);

    let at = image::find_export(&asm.image, "mapdata").unwrap().unwrap() as usize;
    assert_eq!(at, code_start(2));
    assert_eq!(u16::from_le_bytes([asm.image[at], asm.image[at + 1]]), 3);
    assert_eq!(u16::from_le_bytes([asm.image[at + 2], asm.image[at + 3]]), 2);
    assert_eq!(&asm.image[at + 4..at + 10], &[1, 2, 1, 2, 2, 2]);

    let start = image::find_export(&asm.image, "start").unwrap().unwrap() as usize;
    assert_eq!(start, at + 10);
    assert_eq!(asm.image[start], 0);
}

#[test]
fn mapdata_failure_defines_label_only() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.txt"), "###\n##\n").unwrap();
    let main = dir.path().join("main.s");
    fs::write(&main, ".mapdata \"bad.txt\"\nexit\n").unwrap();

    let asm = Assembler::assemble_file(&main).unwrap();
    assert_eq!(asm.error_count(), 1);
    assert!(matches!(asm.report.errors().next(), Some(Error::MapData(..))));
    assert_eq!(asm.labels.get_val("mapdata"), Some(16));
    assert_eq!(&asm.image[16..], &[0]);
}

#[test]
fn include_splices_tokens() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("inc")).unwrap();
    fs::write(dir.path().join("inc/lib.s"), ".include \"more.s\"\n.define VALUE 42\n").unwrap();
    fs::write(dir.path().join("inc/more.s"), ".define OTHER 7\n").unwrap();
    let main = dir.path().join("main.s");
    fs::write(
        &main,
        indoc! {"
            .include \"inc/lib.s\"
            start:
                pushw VALUE
                pushb OTHER
                exit
        "},
    )
    .unwrap();

    let asm = Assembler::assemble_file(&main).unwrap();
    asm.report.print();
    assert_eq!(asm.error_count(), 0);
    assert_eq!(asm.labels.get_val("start"), Some(16));
    assert_eq!(&asm.image[16..], &[4, 42, 0, 0, 0, 2, 7, 0]);
}

#[test]
fn recursive_include_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("self.s");
    fs::write(&main, ".include \"self.s\"\n").unwrap();
    let result = Assembler::assemble_file(&main);
    assert!(matches!(result, Err(Abort { error: Error::IncludeDepth(_), .. })));
}

#[test]
fn missing_include_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("main.s");
    fs::write(&main, ".include \"nope.s\"\nexit\n").unwrap();
    let result = Assembler::assemble_file(&main);
    assert!(matches!(result, Err(Abort { error: Error::FileOpen(..), .. })));
}

#[test]
fn scan_failure_is_fatal() {
    let result = Assembler::assemble_str("bad.s", "pushb 1\n.string \"open\n");
    match result {
        Err(Abort { error, report }) => {
            assert!(matches!(error, Error::Scan(_)));
            assert_eq!(report.error_count(), 1);
        }
        Ok(_) => panic!("scan error was not fatal"),
    }
}

#[test]
fn label_file() {
    let asm = case(indoc! {"
        .define NEG -1
        start:
            exit
    "});
    let mut out = Vec::new();
    asm.labels.write_to(&mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "0xFFFFFFFF  NEG\n0x00000010  start\n"
    );
}
