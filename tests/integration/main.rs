// Integration test suite for the herd coordination runtime.
//
// Unit tests alongside each module already cover the component-level
// invariants; this suite drives the HTTP tool-call surface end to end for
// the named scenarios in spec §8.4.

mod common;

mod scenarios;
