/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use std::collections::HashMap;
use std::io::Write;
use std::process::Command;

use cicoder::ast::{BinOp, CowType, Expr, LogicalOp, Program, Stmt};
use cicoder::codegen::generate;
use cicoder::file_reader::{FileReader, MockFileReader};
use cicoder::symbols::{SubroutineSignature, SymbolEnvironment};
use cicoder::CompiledUnit;

fn byte_type() -> CowType {
    CowType::Int {
        width: 1,
        signed: false,
    }
}

fn word_type() -> CowType {
    CowType::Int {
        width: 2,
        signed: true,
    }
}

#[test]
fn empty_program_still_emits_header_and_terminator() {
    let program = Program {
        declarations: vec![],
        statements: vec![],
    };
    let symbols = SymbolEnvironment::default();
    let asm = generate(&program, &symbols).unwrap();

    assert!(asm.contains("JMP\t_main"));
    assert!(asm.contains("INCLUDE\t'runtime.mac'"));
    assert!(asm.contains("_main:"));
    assert!(asm.contains("END"));
    assert_eq!(asm.matches("_main:").count(), 1);
}

#[test]
fn global_byte_assignment_stores_with_sta() {
    let program = Program {
        declarations: vec![],
        statements: vec![
            Stmt::VarDecl {
                name: "counter".to_string(),
                typ: byte_type(),
                init: None,
            },
            Stmt::Assignment {
                target: Expr::Ident("counter".to_string()),
                value: Expr::Number(7),
            },
        ],
    };
    let symbols = SymbolEnvironment::default();
    let asm = generate(&program, &symbols).unwrap();

    assert!(asm.contains("\tMVI\tA,7"));
    assert!(asm.contains("\tSTA\tv_counter"));
    assert!(asm.contains("v_counter:\tDS\t1"));
}

#[test]
fn short_circuit_and_is_lowered_without_evaluating_right_unconditionally() {
    let program = Program {
        declarations: vec![],
        statements: vec![
            Stmt::VarDecl {
                name: "a".to_string(),
                typ: byte_type(),
                init: None,
            },
            Stmt::VarDecl {
                name: "b".to_string(),
                typ: byte_type(),
                init: None,
            },
            Stmt::If {
                condition: Expr::Logical {
                    op: LogicalOp::And,
                    left: Box::new(Expr::Ident("a".to_string())),
                    right: Box::new(Expr::Ident("b".to_string())),
                },
                then_body: vec![Stmt::Assignment {
                    target: Expr::Ident("a".to_string()),
                    value: Expr::Number(1),
                }],
                elseifs: vec![],
                else_body: None,
            },
        ],
    };
    let symbols = SymbolEnvironment::default();
    let asm = generate(&program, &symbols).unwrap();

    // The left operand's test must appear before any load of `b`.
    let a_load = asm.find("LDA\tv_a").unwrap();
    let b_load = asm.find("LDA\tv_b").unwrap();
    assert!(a_load < b_load);
    assert!(asm.contains("JZ\tFALSE"));
}

#[test]
fn array_element_store_computes_address_before_writing() {
    let program = Program {
        declarations: vec![],
        statements: vec![
            Stmt::VarDecl {
                name: "buf".to_string(),
                typ: CowType::Array {
                    element: Box::new(byte_type()),
                    count: 8,
                },
                init: None,
            },
            Stmt::Assignment {
                target: Expr::ArrayAccess {
                    array: Box::new(Expr::Ident("buf".to_string())),
                    index: Box::new(Expr::Number(2)),
                    resolved_type: byte_type(),
                },
                value: Expr::Number(9),
            },
        ],
    };
    let symbols = SymbolEnvironment::default();
    let asm = generate(&program, &symbols).unwrap();

    assert!(asm.contains("\tMOV\tM,A"));
    assert!(asm.contains("v_buf:\tDS\t8"));
    // The array's address, not its contents, must feed the store: a bare
    // `LHLD v_buf` here would dereference whatever bytes happen to sit at
    // the array's own storage instead of the array itself.
    assert!(asm.contains("\tLXI\tH,v_buf"));
    assert!(!asm.contains("\tLHLD\tv_buf"));
}

#[test]
fn direct_call_passes_two_word_arguments() {
    let mut subroutines = HashMap::new();
    subroutines.insert(
        "add".to_string(),
        SubroutineSignature {
            params: vec![],
            returns: vec![],
        },
    );
    let symbols = SymbolEnvironment {
        subroutines,
        ..Default::default()
    };

    let program = Program {
        declarations: vec![],
        statements: vec![Stmt::ExprStmt(Expr::Call {
            target: Box::new(Expr::Ident("add".to_string())),
            args: vec![Expr::Number(1), Expr::Number(2)],
            resolved_type: None,
        })],
    };
    let asm = generate(&program, &symbols).unwrap();

    assert!(asm.contains("\tCALL\tadd"));
    assert_eq!(asm.matches("\tPUSH\tH").count(), 2);
    assert_eq!(asm.matches("\tPOP\tD").count(), 2);
}

#[test]
fn indirect_call_through_a_variable_uses_the_trampoline() {
    let program = Program {
        declarations: vec![],
        statements: vec![
            Stmt::VarDecl {
                name: "callback".to_string(),
                typ: CowType::Interface,
                init: None,
            },
            Stmt::ExprStmt(Expr::Call {
                target: Box::new(Expr::Ident("callback".to_string())),
                args: vec![],
                resolved_type: None,
            }),
        ],
    };
    let symbols = SymbolEnvironment::default();
    let asm = generate(&program, &symbols).unwrap();

    assert!(asm.contains("\tLHLD\tv_callback"));
    assert!(asm.contains("\tCALL\t_callhl"));
}

#[test]
fn recursive_call_is_rejected() {
    let mut subroutines = HashMap::new();
    subroutines.insert(
        "loopy".to_string(),
        SubroutineSignature {
            params: vec![],
            returns: vec![],
        },
    );
    let symbols = SymbolEnvironment {
        subroutines,
        ..Default::default()
    };
    let program = Program {
        declarations: vec![cicoder::ast::SubDecl {
            name: "loopy".to_string(),
            params: vec![],
            returns: vec![],
            extern_name: None,
            body: Some(vec![Stmt::ExprStmt(Expr::Call {
                target: Box::new(Expr::Ident("loopy".to_string())),
                args: vec![],
                resolved_type: None,
            })]),
        }],
        statements: vec![],
    };
    let err = generate(&program, &symbols).expect_err("recursion must be rejected");
    assert!(matches!(
        err,
        cicoder::errors::CodegenError::InvalidRecursion { .. }
    ));
}

#[test]
fn string_literals_with_equal_value_share_one_label() {
    let program = Program {
        declarations: vec![],
        statements: vec![
            Stmt::VarDecl {
                name: "msg".to_string(),
                typ: CowType::Ptr(Box::new(byte_type())),
                init: Some(Expr::Str("hi".to_string())),
            },
            Stmt::VarDecl {
                name: "msg2".to_string(),
                typ: CowType::Ptr(Box::new(byte_type())),
                init: Some(Expr::Str("hi".to_string())),
            },
        ],
    };
    let symbols = SymbolEnvironment::default();
    let asm = generate(&program, &symbols).unwrap();

    assert_eq!(asm.matches("DB\t104,105,0").count(), 1);
}

#[test]
fn variable_declared_twice_does_not_duplicate_its_data_segment_slot() {
    let program = Program {
        declarations: vec![],
        statements: vec![
            Stmt::VarDecl {
                name: "total".to_string(),
                typ: word_type(),
                init: None,
            },
            Stmt::Assignment {
                target: Expr::Ident("total".to_string()),
                value: Expr::Binary {
                    op: BinOp::Add,
                    left: Box::new(Expr::Ident("total".to_string())),
                    right: Box::new(Expr::Number(1)),
                    resolved_type: word_type(),
                },
            },
        ],
    };
    let symbols = SymbolEnvironment::default();
    let asm = generate(&program, &symbols).unwrap();

    assert_eq!(asm.matches("v_total:\tDS\t2").count(), 1);
}

#[test]
fn cli_round_trip_writes_assembly_to_the_requested_output_file() {
    let program = Program {
        declarations: vec![],
        statements: vec![Stmt::VarDecl {
            name: "x".to_string(),
            typ: byte_type(),
            init: Some(Expr::Number(1)),
        }],
    };
    let unit = CompiledUnit {
        program,
        symbols: SymbolEnvironment::default(),
    };
    let json = serde_json::to_string(&unit).unwrap();

    let mut input_file = tempfile::NamedTempFile::new().unwrap();
    write!(input_file, "{json}").unwrap();
    let output_file = tempfile::NamedTempFile::new().unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_cicoder"))
        .arg(input_file.path())
        .arg("-o")
        .arg(output_file.path())
        .status()
        .expect("failed to run cicoder binary");
    assert!(status.success());

    let generated = std::fs::read_to_string(output_file.path()).unwrap();
    assert!(generated.contains("v_x:\tDS\t1"));
}

#[test]
fn mock_file_reader_reports_missing_files() {
    let reader = MockFileReader::default();
    let result = reader.read_to_string(std::path::Path::new("missing.json"));
    assert!(result.is_err());
}
