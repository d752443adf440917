use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use arch::image;
use indoc::indoc;
use tvmasm::Assembler;
use tvmemu::hooks::Hook;
use tvmemu::loader::{load, map_info};
use tvmemu::model::State;
use tvmemu::{Console, Fault, Vm};

fn assemble(code: &str) -> (Vec<u8>, u32) {
    println!("{code}");
    let asm = Assembler::assemble_str("case.s", code).unwrap();
    asm.report.print();
    assert_eq!(asm.error_count(), 0);
    let start = image::find_export(&asm.image, "start").unwrap().unwrap();
    (asm.image, start)
}

fn case_with(code: &str, input: &str, cells: usize) -> (Result<u64, Fault>, String) {
    let (image, start) = assemble(code);
    let mut out = Vec::new();
    let result = {
        let mut vm = Vm::with_stack(image, Console::new(input.as_bytes(), &mut out), cells);
        vm.run_with(start, &mut [], Some(10_000))
    };
    let out = String::from_utf8(out).unwrap();
    println!("> {out:?} {result:?}");
    (result, out)
}

fn case(code: &str) -> (Result<u64, Fault>, String) {
    case_with(code, "", 64)
}

#[test]
fn add_prints_sum() {
    let (result, out) = case(indoc! {"
        .export start
        start:
            pushb 5
            pushb 3
            add
            saynum
            exit
    "});
    assert_eq!(result.unwrap(), 5);
    assert_eq!(out, "8");
}

#[test]
fn nested_calls_return_values() {
    let (result, out) = case(indoc! {"
        .export start
        start:
            pushw outer
            call
            saynum
            exit
        outer:
            pushw inner
            call
            pushb 10
            add
            ret
        inner:
            pushb 32
            ret
    "});
    assert!(result.is_ok());
    assert_eq!(out, "42");
}

#[test]
fn arithmetic_wraps_and_truncates() {
    let (result, out) = case(indoc! {"
        .export start
        start:
            pushb -7
            pushb 2
            div
            saynum
            pushb 32
            saychar
            pushb -7
            pushb 2
            mod
            saynum
            pushb 32
            saychar
            pushw 0x7FFFFFFF
            inc
            saynum
            pushb 32
            saychar
            pushb 6
            pushb 7
            mul
            dec
            pushb 1
            sub
            saynum
            exit
    "});
    assert!(result.is_ok());
    assert_eq!(out, "-3 -1 -2147483648 40");
}

#[test]
fn loops_and_branches() {
    let (result, out) = case(indoc! {"
        .export start
        start:
            pushb 3
        loop:
            stkdup
            saynum
            dec
            stkdup
            pushw loop
            jnz
            pushb 0
            pushw skip
            jz
            pushb 9
            saynum
        skip:
            pushb 2
            jumprel
            pushb 9
            pushb 7
            saynum
            exit
    "});
    assert!(result.is_ok());
    assert_eq!(out, "3217");
}

#[test]
fn strings_and_memory() {
    let (result, out) = case(indoc! {"
        .export start
        start:
            pushw message
            saystr
            pushw cell
            pushw -2
            stores
            pushw cell
            reads
            saynum
            pushw cell
            readb
            saynum
            exit
        message:
            .string \"hello \"
        cell:
            .zero 4
    "});
    assert!(result.is_ok());
    assert_eq!(out, "hello 65534254");
}

#[test]
fn gets_fills_buffer() {
    let code = indoc! {"
        .export start
        start:
            pushb 8
            pushw buffer
            gets
            pushw buffer
            readb
            saynum
            pushb 32
            saychar
            pushw text
            saystr
            exit
        buffer:
            .byte 0
        text:
            .zero 7
    "};
    let (result, out) = case_with(code, "hello world\nrest\n", 64);
    assert!(result.is_ok());
    assert_eq!(out, "6 hello ");

    let (result, out) = case_with(code, "", 64);
    assert!(result.is_ok());
    assert_eq!(out, "0 ");
}

#[test]
fn gets_rejects_tiny_buffer() {
    let (result, _) = case(indoc! {"
        .export start
        start:
            pushb 1
            pushw start
            gets
            exit
    "});
    assert!(matches!(result, Err(Fault::BufferTooSmall(1))));
}

#[test]
fn stack_underflow() {
    let (result, _) = case(".export start\nstart:\n pushb 1\n add\n exit\n");
    assert!(matches!(result, Err(Fault::StackUnderflow)));

    let (result, _) = case(".export start\nstart:\n pushb 1\n ret\n");
    assert!(matches!(result, Err(Fault::StackUnderflow)));
}

#[test]
fn stack_overflow() {
    let (result, _) = case_with(
        ".export start\nstart:\n pushb 1\n pushb 2\n pushb 3\n exit\n",
        "",
        2,
    );
    assert!(matches!(result, Err(Fault::StackOverflow(2))));
}

#[test]
fn divide_by_zero() {
    let (result, _) = case(".export start\nstart:\n pushb 1\n pushb 0\n div\n exit\n");
    assert!(matches!(result, Err(Fault::DivideByZero)));

    let (result, _) = case(".export start\nstart:\n pushb 1\n pushb 0\n mod\n exit\n");
    assert!(matches!(result, Err(Fault::DivideByZero)));
}

#[test]
fn bad_addresses() {
    let (result, _) = case(".export start\nstart:\n pushw 100000\n readb\n exit\n");
    assert!(matches!(
        result,
        Err(Fault::OutOfBounds {
            addr: 100000,
            len: 1
        })
    ));

    let (result, _) = case(".export start\nstart:\n pushw -1\n jump\n");
    assert!(matches!(result, Err(Fault::PcOutOfBounds(u32::MAX))));

    let (result, _) = case(".export start\nstart:\n pushw text\n saystr\n exit\ntext:\n .byte 65 66\n");
    assert!(matches!(result, Err(Fault::OutOfBounds { .. })));
}

#[test]
fn unknown_opcode() {
    let (result, _) = case(".export start\nstart:\n .byte 200\n");
    assert!(matches!(result, Err(Fault::UnknownOpcode(200))));
}

#[test]
fn step_limit() {
    let (result, _) = case(".export start\nstart:\n pushw start\n jump\n");
    assert!(matches!(result, Err(Fault::TimeLimit(10_000))));
}

#[test]
fn hooks_see_each_instruction() {
    struct Record(Rc<RefCell<Vec<u32>>>);
    impl Hook for Record {
        fn exec(&mut self, _time: u64, state: &State) {
            self.0.borrow_mut().push(state.pc);
        }
    }

    let (image, start) = assemble(".export start\nstart:\n pushb 1\n saynum\n exit\n");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut hooks: Vec<Box<dyn Hook>> = vec![Box::new(Record(seen.clone()))];
    let mut out = Vec::new();
    let mut vm = Vm::new(image, Console::new(&b""[..], &mut out));
    assert_eq!(vm.run_with(start, &mut hooks, None).unwrap(), 3);
    assert_eq!(*seen.borrow(), vec![start, start + 2, start + 3]);
}

#[test]
fn map_width_through_export() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("map.txt"), "#.#\n.#.\n").unwrap();
    let main = dir.path().join("main.s");
    fs::write(
        &main,
        indoc! {"
            .tileinfo '#' 1
            .tileinfo '.' 0
            .mapdata \"map.txt\"
            .export mapdata start
            start:
                pushw mapdata
                reads
                saynum
                pushw mapdata
                pushb 5
                add
                readb
                saynum
                exit
        "},
    )
    .unwrap();

    let asm = Assembler::assemble_file(&main).unwrap();
    asm.report.print();
    assert_eq!(asm.error_count(), 0);
    let path = dir.path().join("output.bc");
    fs::write(&path, &asm.image).unwrap();

    let image = load(&path).unwrap();
    let map = map_info(&image).unwrap().unwrap();
    assert_eq!((map.width, map.height, map.len()), (3, 2, 6));
    assert_eq!(map.data() as usize, image::code_start(2) + 4);

    let start = image::find_export(&image, "start").unwrap().unwrap();
    let mut out = Vec::new();
    Vm::new(image, Console::new(&b""[..], &mut out))
        .run(start)
        .unwrap();
    assert_eq!(out, b"30");
}
