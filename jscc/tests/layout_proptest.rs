//! Property tests for layout preservation

use jscc::scanner::scan;
use jscc::{Options, preprocess};
use proptest::prelude::*;

/// Source text with no directives, references or carriage returns
fn plain_source() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 \n;(){}=+*.,_-]{0,200}"
}

fn dead_body() -> impl Strategy<Value = String> {
    "[a-z0-9 \n;(){}=+*.,]{0,120}"
}

proptest! {
    #[test]
    fn plain_source_is_unchanged(src in plain_source()) {
        let out = preprocess(&src, "p.js", &Options::default()).unwrap();
        prop_assert_eq!(&out.output, &src);
        prop_assert!(!out.changed);
        let map = out.position_map.unwrap();
        prop_assert!(map.pairs.iter().all(|(o, i)| o == i));
    }

    #[test]
    fn scanner_spans_are_contiguous(src in "(\\PC|\n){0,120}") {
        let mut pos = 0;
        for span in scan(&src) {
            prop_assert_eq!(span.start, pos);
            prop_assert!(span.end > span.start);
            pos = span.end;
        }
        prop_assert_eq!(pos, src.len());
    }

    #[test]
    fn keep_lines_blanks_in_place(body in dead_body()) {
        let src = format!("//#if 0\n{body}\n//#endif\n");
        let options = Options::default().with_keep_lines(true);
        let out = preprocess(&src, "p.js", &options).unwrap().output;
        prop_assert_eq!(out.len(), src.len());
        prop_assert_eq!(out.lines().count(), src.lines().count());
        prop_assert!(out.trim().is_empty());
    }

    #[test]
    fn position_map_is_monotonic(body in dead_body(), tail in plain_source()) {
        let src = format!("head\n//#if 0\n{body}\n//#endif\n{tail}");
        let out = preprocess(&src, "p.js", &Options::default()).unwrap();
        let map = out.position_map.unwrap();
        prop_assert!(map.pairs.windows(2).all(|w| w[0].0 < w[1].0 && w[0].1 < w[1].1));
        prop_assert_eq!(&out.output, &format!("head\n{tail}"));
    }
}
