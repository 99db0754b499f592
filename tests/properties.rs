mod vm;

use wordlang::bytecode::decode;
use wordlang::{compile, compile_with, encode_image, Category, Options};

use self::vm::{run, Exit};

const STEPS: usize = 100_000;

/// Programs paired with the value they return when run.
const PROGRAMS: &[(&str, Option<u16>)] = &[
    ("", None),
    ("let x = 1; x;", None),
    ("return 2 + 3 * 4;", Some(14)),
    ("return (2 + 3) * 4;", Some(20)),
    ("return 0 - 1;", Some(65535)),
    ("return -(2 * 3) + 10;", Some(4)),
    ("return 7 / 2 + 7 % 2;", Some(4)),
    ("return 65535 < 1;", Some(0)),
    ("return !0 || !5;", Some(1)),
    ("return true && 0;", Some(0)),
    ("return 0 || 3;", Some(1)),
    ("if (1) { return 2; } else { return 3; }", Some(2)),
    ("if (0) { return 2; } else if (false) { return 3; } else { return 4; }", Some(4)),
    ("let x = 0; while (0) { x = 1; } return x;", Some(0)),
    ("let a = 1; let b = a = 5; return a + b;", Some(10)),
    (
        "let i = 0; let sum = 0; while (i < 10) { i = i + 1; sum = sum + i; } return sum;",
        Some(55),
    ),
    (
        "let x = 1; { let y = 2; x = x + y; } { let z = 3; x = x * z; } return x;",
        Some(9),
    ),
    (
        "function fib(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }
         return fib(10);",
        Some(55),
    ),
    (
        "return gcd(48, 18);
         function gcd(a, b) { while (b != 0) { let t = b; b = a % b; a = t; } return a; }",
        Some(6),
    ),
    (
        "function even(n): bool { if (n == 0) { return true; } return odd(n - 1); }
         function odd(n): bool { if (n == 0) { return false; } return even(n - 1); }
         return even(10) && !odd(7) == false;",
        Some(1),
    ),
    (
        "function side(x) { return x * 2; }
         let r = 0;
         if (false && side(1)) { r = 1; } else if (true || side(2)) { r = 2; }
         return r;",
        Some(2),
    ),
    (
        "function nothing() {}
         function twice(x: int): int { return x + x; }
         nothing();
         return twice(nothing() + 21);",
        Some(42),
    ),
    (
        "let n = 5; let acc = 1;
         while (n > 1) { acc = acc * n; n = n - 1; }
         if (acc == 120) { return acc / 10; }
         return 0;",
        Some(12),
    ),
];

fn exit_of(words: &[u16]) -> Exit {
    run(words, STEPS).unwrap_or_else(|fault| panic!("{fault:?} running {words:?}"))
}

#[test]
fn compiled_streams_decode() {
    for (source, _) in PROGRAMS {
        for optimize in [false, true] {
            let words = compile(source, optimize).unwrap();
            assert!(decode(&words).is_ok(), "{source}");
        }
    }
}

#[test]
fn compilation_is_deterministic() {
    for (source, _) in PROGRAMS {
        for optimize in [false, true] {
            assert_eq!(compile(source, optimize), compile(source, optimize), "{source}");
        }
    }
}

#[test]
fn optimization_never_grows_output() {
    for (source, _) in PROGRAMS {
        let plain = compile(source, false).unwrap();
        let optimized = compile(source, true).unwrap();
        assert!(optimized.len() <= plain.len(), "{source}");
    }
}

#[test]
fn programs_compute_their_values() {
    for (source, expected) in PROGRAMS {
        let expected = expected.map_or(Exit::Halt, Exit::Return);
        for optimize in [false, true] {
            let words = compile(source, optimize).unwrap();
            assert_eq!(exit_of(&words), expected, "{source} (optimize: {optimize})");
        }
    }
}

#[test]
fn constant_branch_optimizes_to_its_taken_side() {
    let branch = compile("if (1) { return 2; } else { return 3; }", true).unwrap();
    assert_eq!(branch, compile("return 2;", true).unwrap());
    assert_eq!(branch, vec![0x06, 0, 0x01, 2, 0x24, 0x00]);
}

#[test]
fn empty_source_is_an_empty_stream() {
    assert_eq!(compile("", false), Ok(vec![]));
    assert_eq!(compile("", true), Ok(vec![]));
}

#[test]
fn functions_only_program_still_has_an_entry() {
    let words = compile("function f() { return 1; }", false).unwrap();
    assert_eq!(&words[..3], &[0x06, 0, 0x00]);
    assert_eq!(exit_of(&words), Exit::Halt);
}

#[test]
fn image_is_two_bytes_per_word() {
    let words = compile("return 258;", false).unwrap();
    let image = encode_image(&words);
    assert_eq!(image.len(), words.len() * 2);
    assert_eq!(&image[4..8], &[0x01, 0x00, 0x02, 0x01]);
}

#[test]
fn pass_limit_of_zero_disables_rewrites() {
    let source = "let x = 1 + 2; x;";
    let options = Options::default().optimize(true).max_passes(0);
    assert_eq!(compile_with(source, &options), compile(source, false));
}

#[test]
fn deep_expressions_hit_a_limit_instead_of_overflowing() {
    let source = format!("return {}1{};", "(".repeat(10_000), ")".repeat(10_000));
    let err = compile(&source, false).unwrap_err();
    assert_eq!(err.category, Category::ResourceLimit);

    let source = format!("return {}1;", "-".repeat(10_000));
    let err = compile(&source, true).unwrap_err();
    assert_eq!(err.category, Category::ResourceLimit);
}
