//! Fuzz target: `ProgramParser` + `CommandExecutor`
//!
//! Feeds arbitrary bytes through the program parser and expands every
//! accepted command into motion steps.  Asserts that the parser never
//! panics, only yields commands that validate, and that every plan fits
//! its fixed capacity.
//!
//! cargo fuzz run fuzz_program_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use solderstation::config::ExecutionConfig;
use solderstation::execution::plan::PLAN_CAPACITY;
use solderstation::gcode::{CommandExecutor, ProgramParser, validate};

fuzz_target!(|data: &[u8]| {
    let Ok(mut parser) = ProgramParser::from_bytes(data) else {
        return;
    };
    let mut executor = CommandExecutor::new(ExecutionConfig::default(), 20);

    let mut first = Vec::new();
    while let Some(cmd) = parser.next_command() {
        assert!(validate(&cmd).is_ok(), "parser yielded an invalid command");
        let plan = executor.plan(&cmd);
        assert!(plan.len() <= PLAN_CAPACITY);
        first.push(cmd);
    }

    // A rewound parser yields the same commands again.
    parser.reset();
    let mut second = Vec::new();
    while let Some(cmd) = parser.next_command() {
        second.push(cmd);
    }
    assert_eq!(first, second);
});
