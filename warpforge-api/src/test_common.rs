use expect_test::Expect;
use serde::{de::DeserializeOwned, Serialize};

/// Parses `expect`'s literal as JSON, re-encodes it, and asserts the
/// re-encoding is byte-identical — the round-trip property spec.md §8
/// requires of every wire document when maps are emitted in declared key
/// order.
pub fn assert_eq_json_roundtrip<T>(expect: &Expect)
where
	T: DeserializeOwned + Serialize,
{
	let source = expect.data();
	let parsed: T = serde_json::from_str(source).expect("fixture should parse");
	let rendered = serde_json::to_string_pretty(&parsed).expect("fixture should reserialize");
	expect.assert_eq(&rendered);
}
