//! Fuzz target: `parse_drill`
//!
//! Arbitrary text into the Excellon importer.  Must never panic, and every
//! produced point must be a solder point at soldering height.
//!
//! cargo fuzz run fuzz_drill_import

#![no_main]

use libfuzzer_sys::fuzz_target;
use solderstation::drill::{DrillImport, parse_drill};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let import = DrillImport::default();
    for point in parse_drill(text, &import) {
        assert!(point.solder);
        assert_eq!(point.z, import.scale.soldering_z);
    }
});
