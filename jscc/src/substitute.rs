use crate::config::QuoteKind;
use crate::context::Environment;
use crate::output::EditBuffer;
use crate::token::{is_word_byte, variable_name_len};
use crate::value::Value;

/// A `$_NAME` or `$_NAME.prop` reference found in source text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference<'a> {
    /// Offset of the `$`
    pub start: usize,
    /// End of the reference, after the property when there is one
    pub end: usize,
    /// Variable name without the sigil
    pub name: &'a str,
    /// Property name without the dot
    pub property: Option<&'a str>,
}

/// Find every variable reference in `text`
///
/// A reference must not be followed by a word character, so `$_FOOx` is not
/// a reference to `_FOO`.
#[must_use]
pub fn find_references(text: &str) -> Vec<Reference<'_>> {
    let bytes = text.as_bytes();
    let mut refs = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('$') {
        let start = pos + offset;
        pos = start + 1;
        let Some(name_len) = variable_name_len(&text[pos..]) else {
            continue;
        };
        let name_end = pos + name_len;
        let mut end = name_end;
        let mut property = None;
        if bytes.get(end) == Some(&b'.') {
            let prop_len = bytes[end + 1..]
                .iter()
                .take_while(|b| is_word_byte(**b))
                .count();
            if prop_len > 0 {
                property = Some(&text[end + 1..end + 1 + prop_len]);
                end += 1 + prop_len;
            }
        }
        if bytes.get(end).is_some_and(|b| is_word_byte(*b)) {
            continue;
        }
        refs.push(Reference {
            start,
            end,
            name: &text[pos..name_end],
            property,
        });
        pos = end;
    }

    refs
}

/// Text a reference is replaced with, and the end of the consumed range
///
/// Properties are only resolved on arrays and objects that have them; in every
/// other case the `.prop` suffix is left in the source.
fn replacement(
    reference: &Reference<'_>,
    value: &Value,
    quotes: Option<QuoteKind>,
) -> (String, usize) {
    let resolved = reference
        .property
        .filter(|_| value.is_structured())
        .and_then(|prop| value.property(prop));
    let (value, end) = match resolved {
        Some(prop_value) => (prop_value, reference.end),
        None => {
            let end = reference.start + 1 + reference.name.len();
            (value.clone(), end)
        }
    };
    let text = match (&value, quotes) {
        (Value::String(s), Some(q)) => q.escape(s),
        _ => value.to_source_text(),
    };
    (text, end)
}

/// Record replacements for the references in `text[start..end]`
///
/// Returns the number of references replaced. Unknown names are left alone.
pub fn replace_references(
    buffer: &mut EditBuffer<'_>,
    text: &str,
    start: usize,
    end: usize,
    env: &Environment,
    quotes: Option<QuoteKind>,
) -> usize {
    let Some(chunk) = text.get(start..end) else {
        return 0;
    };
    let mut count = 0;
    for reference in find_references(chunk) {
        let Some(value) = env.get(reference.name) else {
            continue;
        };
        let (replaced, consumed) = replacement(&reference, value, quotes);
        buffer.overwrite(start + reference.start, start + consumed, replaced);
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str, env: &Environment, quotes: Option<QuoteKind>) -> String {
        let mut buffer = EditBuffer::new(src);
        replace_references(&mut buffer, src, 0, src.len(), env, quotes);
        buffer.render(false, false).0
    }

    fn env() -> Environment {
        let mut env = Environment::new();
        env.insert("_FOO", Value::from("foo"));
        env.insert("_N", Value::from(1.5));
        env.insert("_T", Value::Bool(true));
        env.insert("_U", Value::Undefined);
        env.insert("_Q", Value::from("it's"));
        env.insert(
            "_OBJ",
            Value::parse_literal(r#"{"name": "app", "list": [1, 2]}"#),
        );
        env
    }

    #[test]
    fn reference_shapes() {
        let refs = find_references("$_A + $_B.c + $_Cx + $x + $_D.");
        let names: Vec<_> = refs.iter().map(|r| (r.name, r.property)).collect();
        assert_eq!(names, [("_A", None), ("_B", Some("c")), ("_D", None)]);
    }

    #[test]
    fn scalars_use_natural_form() {
        let env = env();
        assert_eq!(run("x = '$_FOO'", &env, None), "x = 'foo'");
        assert_eq!(run("$_N,$_T,$_U", &env, None), "1.5,true,undefined");
    }

    #[test]
    fn unknown_names_are_left_alone() {
        assert_eq!(run("$_NOPE $_FOOd", &env(), None), "$_NOPE $_FOOd");
    }

    #[test]
    fn object_properties() {
        let env = env();
        assert_eq!(run("$_OBJ.name", &env, None), "app");
        assert_eq!(run("$_OBJ.list", &env, None), "[1,2]");
        assert_eq!(run("$_OBJ.nope", &env, None), r#"{"list":[1,2],"name":"app"}.nope"#);
        assert_eq!(run("$_FOO.length", &env, None), "foo.length");
    }

    #[test]
    fn quotes_are_escaped_in_strings() {
        let env = env();
        assert_eq!(run("'$_Q'", &env, Some(QuoteKind::Single)), r"'it\'s'");
        assert_eq!(run("'$_Q'", &env, None), "'it's'");
    }
}
