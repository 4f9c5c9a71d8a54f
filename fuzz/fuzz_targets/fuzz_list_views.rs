#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use micro_bind::{List, Value, filter, map};

#[derive(Debug, Arbitrary)]
enum Op {
    Set { index: u8, value: i8 },
    Splice { start: u8, delete: u8, items: Vec<i8> },
}

#[derive(Debug, Arbitrary)]
struct Input {
    initial: Vec<i8>,
    ops: Vec<Op>,
}

fn positive(value: &Value) -> bool {
    value.as_number().is_some_and(|n| n > 0.0)
}

fn negate(value: &Value) -> Value {
    Value::from(-value.as_number().unwrap_or(0.0))
}

fuzz_target!(|input: Input| {
    let source: List = input.initial.iter().map(|&v| i32::from(v)).collect();
    let kept = filter(&source, |v, _, _| positive(v));
    let negated = map(&kept, negate);

    for op in input.ops.iter().take(64) {
        match op {
            Op::Set { index, value } => {
                let index = usize::from(*index) % (source.len() + 1);
                source.set(index, i32::from(*value));
            }
            Op::Splice {
                start,
                delete,
                items,
            } => {
                source.splice(
                    usize::from(*start),
                    usize::from(*delete),
                    items.iter().take(8).map(|&v| i32::from(v)),
                );
            }
        }

        let expected: Vec<Value> = source.to_vec().into_iter().filter(positive).collect();
        assert_eq!(kept.to_vec(), expected);
        let expected: Vec<Value> = expected.iter().map(negate).collect();
        assert_eq!(negated.to_vec(), expected);
    }
});
