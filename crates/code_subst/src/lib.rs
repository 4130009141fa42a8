#![forbid(unsafe_code)]

//! Rewrites over user-supplied code fragments. Two primitives: whole-token
//! name substitution of `$(name)` markers, and pseudo-call substitution of
//! `$(name, a0, .., ak)` with a fixed-arity template. All rewrites are
//! left-to-right and never recurse into already-substituted output.

/// Replace every occurrence of `token` with `replacement`.
pub fn substitute(code: &str, token: &str, replacement: &str) -> String {
    code.replace(token, replacement)
}

/// Rewrite `$(<name><ext>)` to `<prefix><name><postfix>` for each name.
/// `ext` distinguishes the `_pre` / `_post` suffixed reference forms used
/// by synaptic code; pass `""` for the plain form.
pub fn name_substitutions<'a, I>(
    code: &str,
    prefix: &str,
    names: I,
    postfix: &str,
    ext: &str,
) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut code = code.to_string();
    for name in names {
        code = substitute(
            &code,
            &format!("$({}{})", name, ext),
            &format!("{}{}{}", prefix, name, postfix),
        );
    }
    code
}

/// Rewrite `$(<name><ext>)` to `(<value>)` for each (name, value) pair.
/// Values arrive pre-formatted for the target precision; the parentheses
/// keep the constant atomic inside user expressions.
pub fn value_substitutions<'a, I>(code: &str, pairs: I, ext: &str) -> String
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    let mut code = code.to_string();
    for (name, value) in pairs {
        code = substitute(&code, &format!("$({}{})", name, ext), &format!("({})", value));
    }
    code
}

/// Rewrite every `$(func_name, a0, .., a_{arity-1})` pseudo-call by
/// instantiating `template`, whose `$(0)` .. `$(arity-1)` placeholders
/// receive the positional arguments. Argument commas are split at top
/// level only; nested parentheses are respected. An occurrence whose
/// argument count does not match `arity` is left untouched.
pub fn function_substitute(code: &str, func_name: &str, arity: usize, template: &str) -> String {
    let pattern = format!("$({}", func_name);
    let mut out = String::new();
    let mut rest = code;
    loop {
        let Some(pos) = rest.find(&pattern) else {
            out.push_str(rest);
            return out;
        };
        let tail = &rest[pos + pattern.len()..];
        // Reject longer names sharing this one as a prefix.
        let at_args = tail.trim_start();
        let boundary_ok = if arity == 0 {
            at_args.starts_with(')')
        } else {
            at_args.starts_with(',')
        };
        if !boundary_ok {
            out.push_str(&rest[..pos + pattern.len()]);
            rest = tail;
            continue;
        }

        match parse_call_args(tail) {
            Some((args, consumed)) if args.len() == arity => {
                out.push_str(&rest[..pos]);
                let mut expansion = template.to_string();
                for (i, arg) in args.iter().enumerate() {
                    expansion = substitute(&expansion, &format!("$({})", i), arg);
                }
                out.push_str(&expansion);
                rest = &tail[consumed..];
            }
            _ => {
                out.push_str(&rest[..pos + pattern.len()]);
                rest = tail;
            }
        }
    }
}

/// Parse `, a0, a1)` (or a bare `)`) following the call name. Returns the
/// argument list and the byte length consumed, or None if the call never
/// closes.
fn parse_call_args(tail: &str) -> Option<(Vec<String>, usize)> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 1usize;
    let mut seen_any = false;
    for (i, c) in tail.char_indices() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    if seen_any {
                        args.push(current.trim().to_string());
                    }
                    return Some((args, i + 1));
                }
                current.push(c);
            }
            ',' if depth == 1 => {
                if seen_any {
                    args.push(current.trim().to_string());
                    current.clear();
                } else {
                    // the separator between the call name and the first argument
                    seen_any = true;
                }
            }
            _ => {
                if seen_any {
                    current.push(c);
                }
            }
        }
    }
    None
}
