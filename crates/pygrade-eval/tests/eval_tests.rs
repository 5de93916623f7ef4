use pygrade_eval::{EvalError, Interpreter, Limits, Value};
use pygrade_parser::parse_source;

// ──────────────────────────────────────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────────────────────────────────────

fn run(source: &str) -> Interpreter {
    let mut interp = Interpreter::default();
    if let Err(e) = interp.exec_source(source) {
        panic!("execution failed: {e}\nsource:\n{source}");
    }
    interp
}

fn run_err(source: &str) -> EvalError {
    let mut interp = Interpreter::default();
    match interp.exec_source(source) {
        Ok(()) => panic!("expected an error for:\n{source}"),
        Err(e) => e,
    }
}

fn global(interp: &Interpreter, name: &str) -> Value {
    interp
        .lookup(name)
        .unwrap_or_else(|| panic!("'{name}' is not bound"))
}

fn repr_of(source: &str, name: &str) -> String {
    global(&run(source), name).repr()
}

fn eval(source: &str) -> Value {
    let module = parse_source("<test>", source).expect("source should parse");
    let mut interp = Interpreter::default();
    interp
        .last_value(&module)
        .expect("evaluation should succeed")
        .expect("last statement should be an expression")
}

fn param_names(value: &Value) -> Vec<String> {
    value
        .signature()
        .expect("value should expose a signature")
        .params
        .into_iter()
        .map(|p| p.name)
        .collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_arithmetic_follows_python() {
    assert_eq!(eval("7 // 2"), Value::Int(3));
    assert_eq!(eval("-7 // 2"), Value::Int(-4));
    assert_eq!(eval("-7 % 3"), Value::Int(2));
    assert_eq!(eval("7 / 2"), Value::Float(3.5));
    assert_eq!(eval("2 ** 10"), Value::Int(1024));
    assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
}

#[test]
fn test_strings_and_containers() {
    assert_eq!(eval("'ab' * 3").repr(), "'ababab'");
    assert_eq!(eval("[1, 2] + [3]").repr(), "[1, 2, 3]");
    assert_eq!(eval("'hello'[1:4]").repr(), "'ell'");
    assert_eq!(eval("[1, 2, 3, 4][::-1]").repr(), "[4, 3, 2, 1]");
    assert_eq!(eval("{'a': 1}['a']"), Value::Int(1));
    assert_eq!(eval("(1, 2)[-1]"), Value::Int(2));
}

#[test]
fn test_comparison_chain_and_bool_ops() {
    assert_eq!(eval("1 < 2 < 3"), Value::Bool(true));
    assert_eq!(eval("1 < 3 < 2"), Value::Bool(false));
    assert_eq!(eval("0 or 'x'").repr(), "'x'");
    assert_eq!(eval("[] and 1").repr(), "[]");
    assert_eq!(eval("3 in [1, 2, 3]"), Value::Bool(true));
    assert_eq!(eval("'a' not in 'xyz'"), Value::Bool(true));
}

#[test]
fn test_conditional_and_lambda() {
    assert_eq!(eval("(lambda x, y=2: x * y)(4)"), Value::Int(8));
    assert_eq!(eval("'yes' if 0 else 'no'").repr(), "'no'");
}

#[test]
fn test_zero_division() {
    let err = run_err("x = 1 / 0");
    assert!(matches!(err, EvalError::ZeroDivision(_)));
}

#[test]
fn test_growing_sequences_stop_at_length_cap() {
    let err = run_err("s = 'x'\nwhile True:\n    s = s + s");
    assert!(matches!(err, EvalError::Overflow(_)), "{err}");
    let err = run_err("xs = [0]\nwhile True:\n    xs += xs");
    assert!(matches!(err, EvalError::Overflow(_)), "{err}");
    let err = run_err("s = 'a'\nwhile True:\n    s = s.replace('a', 'aa')");
    assert!(matches!(err, EvalError::Overflow(_)), "{err}");
    let err = run_err("s = 'ab'\nwhile True:\n    s = '-'.join([s, s])");
    assert!(matches!(err, EvalError::Overflow(_)), "{err}");
}

#[test]
fn test_self_referencing_list() {
    let interp = run("xs = [1]\nxs.append(xs)\nys = [1]\nys.append(ys)");
    assert_eq!(global(&interp, "xs").repr(), "[1, [...]]");
    assert_eq!(eval("xs = [1]\nxs.append(xs)\nxs == xs"), Value::Bool(true));
    assert_eq!(
        eval("xs = [1]\nxs.append(xs)\nys = [1]\nys.append(ys)\nxs == ys"),
        Value::Bool(false)
    );
    let err = run_err("xs = [1]\nxs.append(xs)\nys = [1]\nys.append(ys)\nxs < ys");
    assert_eq!(err, EvalError::ComparisonDepth);
}

#[test]
fn test_undefined_name_is_name_error() {
    let err = run_err("y = undefined_thing + 1");
    assert!(err.is_name_error());
    assert_eq!(
        err.to_string(),
        "NameError: name 'undefined_thing' is not defined"
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_loops_and_control_flow() {
    let source = "\
total = 0
for i in range(10):
    if i == 7:
        break
    if i % 2:
        continue
    total += i
n = 0
while n < 5:
    n += 1
";
    let interp = run(source);
    assert_eq!(global(&interp, "total"), Value::Int(12));
    assert_eq!(global(&interp, "n"), Value::Int(5));
}

#[test]
fn test_unpacking_assignment() {
    let interp = run("a, *rest, z = [1, 2, 3, 4]\nb = c = 9");
    assert_eq!(global(&interp, "a"), Value::Int(1));
    assert_eq!(global(&interp, "rest").repr(), "[2, 3]");
    assert_eq!(global(&interp, "z"), Value::Int(4));
    assert_eq!(global(&interp, "c"), Value::Int(9));
}

#[test]
fn test_augmented_list_extends_in_place() {
    let interp = run("a = [1]\nb = a\na += [2]");
    assert_eq!(global(&interp, "b").repr(), "[1, 2]");
}

#[test]
fn test_subscript_assignment() {
    let interp = run("d = {}\nd['k'] = 1\nd['k'] += 1\nxs = [0, 0]\nxs[-1] = 5");
    assert_eq!(global(&interp, "d").repr(), "{'k': 2}");
    assert_eq!(global(&interp, "xs").repr(), "[0, 5]");
}

#[test]
fn test_assert_and_raise() {
    let err = run_err("assert 1 == 2, 'nope'");
    assert_eq!(err.to_string(), "AssertionError: nope");

    let err = run_err("raise ValueError('bad input')");
    assert_eq!(err.to_string(), "ValueError: bad input");
}

// ══════════════════════════════════════════════════════════════════════════════
// Functions
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_function_defaults_and_keywords() {
    let source = "\
def f(a, b=10, *, c=100):
    return a + b + c
x = f(1)
y = f(1, 2, c=3)
z = f(b=0, a=0)
";
    let interp = run(source);
    assert_eq!(global(&interp, "x"), Value::Int(111));
    assert_eq!(global(&interp, "y"), Value::Int(6));
    assert_eq!(global(&interp, "z"), Value::Int(100));
}

#[test]
fn test_var_args_and_kwargs() {
    let source = "\
def f(*args, **kwargs):
    return len(args), sorted(kwargs.keys())
r = f(1, 2, b=1, a=2)
";
    assert_eq!(repr_of(source, "r"), "(2, ['a', 'b'])");
}

#[test]
fn test_closures_capture_defining_scope() {
    let source = "\
def make_adder(n):
    def add(x):
        return x + n
    return add
add3 = make_adder(3)
r = add3(4)
";
    assert_eq!(global(&run(source), "r"), Value::Int(7));
}

#[test]
fn test_recursion() {
    let source = "\
def fact(n):
    return 1 if n <= 1 else n * fact(n - 1)
r = fact(10)
";
    assert_eq!(global(&run(source), "r"), Value::Int(3_628_800));
}

#[test]
fn test_binding_error_names_callee() {
    let err = run_err("def f(a):\n    return a\nf(1, 2)");
    assert!(matches!(err, EvalError::Binding { .. }));
    assert!(err.to_string().starts_with("TypeError: f() "), "{err}");

    let err = run_err("def f(a):\n    return a\nf(b=1)");
    assert!(matches!(err, EvalError::Binding { .. }));
}

#[test]
fn test_function_signature_is_introspectable() {
    let interp = run("def f(a, /, b, *args, c, d=1, **kw):\n    pass");
    assert_eq!(
        param_names(&global(&interp, "f")),
        vec!["a", "b", "args", "c", "d", "kw"]
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Classes
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_class_instances_and_methods() {
    let source = "\
class Counter:
    start = 0
    def __init__(self, step=1):
        self.value = Counter.start
        self.step = step
    def bump(self):
        self.value += self.step
        return self.value
c = Counter(step=5)
c.bump()
r = c.bump()
";
    assert_eq!(global(&run(source), "r"), Value::Int(10));
}

#[test]
fn test_class_signature_drops_self() {
    let interp = run("class P:\n    def __init__(self, x, y=0):\n        self.x = x");
    assert_eq!(param_names(&global(&interp, "P")), vec!["x", "y"]);

    let interp = run("class Empty:\n    pass");
    assert!(param_names(&global(&interp, "Empty")).is_empty());
}

#[test]
fn test_inheritance_and_isinstance() {
    let source = "\
class Base:
    def greet(self):
        return 'hi ' + self.name()
class Child(Base):
    def name(self):
        return 'child'
c = Child()
r = c.greet()
ok = isinstance(c, Base)
";
    let interp = run(source);
    assert_eq!(global(&interp, "r").repr(), "'hi child'");
    assert_eq!(global(&interp, "ok"), Value::Bool(true));
}

#[test]
fn test_class_without_init_rejects_arguments() {
    let err = run_err("class A:\n    pass\nA(1)");
    assert_eq!(err.to_string(), "TypeError: A() takes no arguments");
}

#[test]
fn test_missing_attribute() {
    let err = run_err("class A:\n    pass\nA().missing");
    assert!(matches!(err, EvalError::Attribute(_)));
}

// ══════════════════════════════════════════════════════════════════════════════
// Builtins
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_builtin_functions() {
    assert_eq!(eval("len('abc')"), Value::Int(3));
    assert_eq!(eval("sum([1, 2, 3], 10)"), Value::Int(16));
    assert_eq!(eval("abs(-4)"), Value::Int(4));
    assert_eq!(eval("round(2.5)"), Value::Int(2));
    assert_eq!(eval("round(3.14159, 2)"), Value::Float(3.14));
    assert_eq!(eval("max([3, 9, 2])"), Value::Int(9));
    assert_eq!(eval("min(3, 1, key=lambda v: -v)"), Value::Int(3));
    assert_eq!(eval("pow(3, 4, 5)"), Value::Int(1));
    assert_eq!(eval("divmod(7, 2)").repr(), "(3, 1)");
    assert_eq!(eval("int('42') + int('ff', 16)"), Value::Int(297));
    assert_eq!(eval("float('1.5')"), Value::Float(1.5));
    assert_eq!(eval("str(12)").repr(), "'12'");
}

#[test]
fn test_sequence_builtins() {
    assert_eq!(eval("list(range(2, 10, 3))").repr(), "[2, 5, 8]");
    assert_eq!(eval("range(5, 0, -2)").repr(), "[5, 3, 1]");
    assert_eq!(eval("sorted([3, 1, 2], reverse=True)").repr(), "[3, 2, 1]");
    assert_eq!(
        eval("sorted(['bb', 'a', 'ccc'], key=len)").repr(),
        "['a', 'bb', 'ccc']"
    );
    assert_eq!(eval("list(enumerate('ab', 1))").repr(), "[(1, 'a'), (2, 'b')]");
    assert_eq!(eval("list(zip([1, 2, 3], 'ab'))").repr(), "[(1, 'a'), (2, 'b')]");
    assert_eq!(eval("dict(a=1)").repr(), "{'a': 1}");
    assert_eq!(eval("len(set([1, 1, 2]))"), Value::Int(2));
}

#[test]
fn test_builtin_signature_binding_errors() {
    let err = run_err("len([1], [2])");
    assert!(matches!(err, EvalError::Binding { .. }));
    let err = run_err("sorted([1], rev=True)");
    assert!(matches!(err, EvalError::Binding { .. }));
}

#[test]
fn test_range_zero_step() {
    assert!(matches!(run_err("range(1, 5, 0)"), EvalError::Value(_)));
}

#[test]
fn test_string_methods() {
    assert_eq!(eval("'Hi'.upper()").repr(), "'HI'");
    assert_eq!(eval("'  x '.strip()").repr(), "'x'");
    assert_eq!(eval("'a,b,c'.split(',')").repr(), "['a', 'b', 'c']");
    assert_eq!(eval("'a b  c'.split()").repr(), "['a', 'b', 'c']");
    assert_eq!(eval("'-'.join(['x', 'y'])").repr(), "'x-y'");
    assert_eq!(eval("'aaa'.replace('a', 'b', 2)").repr(), "'bba'");
    assert_eq!(eval("'pygrade'.startswith(('x', 'py'))"), Value::Bool(true));
}

#[test]
fn test_list_and_dict_methods() {
    let source = "\
xs = [3, 1]
xs.append(2)
xs.insert(0, 9)
last = xs.pop()
xs.sort()
d = {'a': 1}
g = d.get('b', 0)
items = d.items()
";
    let interp = run(source);
    assert_eq!(global(&interp, "xs").repr(), "[1, 3, 9]");
    assert_eq!(global(&interp, "last"), Value::Int(2));
    assert_eq!(global(&interp, "g"), Value::Int(0));
    assert_eq!(global(&interp, "items").repr(), "[('a', 1)]");
}

#[test]
fn test_bound_method_signature_drops_receiver() {
    let interp = run("xs = []\nm = xs.append");
    assert_eq!(param_names(&global(&interp, "m")), vec!["object"]);
}

#[test]
fn test_print_is_captured() {
    let interp = run("print('a', 1)\nprint('b', end='')\nprint(1, 2, sep='-')");
    assert_eq!(interp.output(), "a 1\nb1-2\n");
}

// ══════════════════════════════════════════════════════════════════════════════
// Imports
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_math_module() {
    assert_eq!(eval("import math\nmath.sqrt(16)"), Value::Float(4.0));
    assert_eq!(eval("from math import floor\nfloor(2.7)"), Value::Int(2));
    assert_eq!(eval("import math as m\nm.ceil(2.1)"), Value::Int(3));
    assert!(matches!(
        run_err("import math\nmath.sqrt(-1)"),
        EvalError::Value(_)
    ));
}

#[test]
fn test_math_signatures() {
    let interp = run("import math");
    let sqrt = Interpreter::default()
        .get_attr(&global(&interp, "math"), "sqrt")
        .expect("math.sqrt exists");
    assert_eq!(param_names(&sqrt), vec!["x"]);
}

#[test]
fn test_unknown_module_is_opaque() {
    let interp = run("import pandas as pd\ndf = pd.read_csv('x.csv')\nh = df.head");
    let head = global(&interp, "h");
    assert!(matches!(head, Value::Opaque(_)));
    assert!(head.signature().is_none());
}

#[test]
fn test_from_import_of_missing_name() {
    let err = run_err("from math import nothing_here");
    assert!(matches!(err, EvalError::Raised(_)));
}

// ══════════════════════════════════════════════════════════════════════════════
// Partial execution and limits
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_exec_partial_keeps_earlier_bindings() {
    let module = parse_source("<test>", "a = 1\nb = missing\nc = 3").expect("parses");
    let mut interp = Interpreter::default();
    let error = interp.exec_partial(&module).expect("should stop at 'missing'");
    assert!(error.is_name_error());
    assert_eq!(interp.lookup("a"), Some(Value::Int(1)));
    assert_eq!(interp.lookup("c"), None);
}

#[test]
fn test_last_value_of_non_expression() {
    let module = parse_source("<test>", "x = 1").expect("parses");
    let mut interp = Interpreter::default();
    assert_eq!(interp.last_value(&module), Ok(None));
    assert_eq!(interp.lookup("x"), Some(Value::Int(1)));
}

#[test]
fn test_infinite_loop_exhausts_gas() {
    let mut interp = Interpreter::new(Limits {
        gas_limit: 10_000,
        ..Limits::default()
    });
    let err = interp
        .exec_source("while True:\n    pass")
        .expect_err("loop must be stopped");
    assert_eq!(err, EvalError::GasExhausted(10_000));
    assert!(err.is_limit());
}

#[test]
fn test_unbounded_recursion_hits_depth_limit() {
    let err = run_err("def f(n):\n    return f(n + 1)\nf(0)");
    assert_eq!(err, EvalError::RecursionLimit(Limits::default().max_call_depth));
}

#[test]
fn test_huge_range_is_charged() {
    let err = run_err("r = range(10 ** 12)");
    assert!(matches!(err, EvalError::GasExhausted(_)));
}

#[test]
fn test_syntax_error_surfaces() {
    assert!(matches!(run_err("x = (1,"), EvalError::Syntax(_)));
}

// ══════════════════════════════════════════════════════════════════════════════
// Determinism
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_eval_determinism_100_iterations() {
    let source = "\
def f(xs, key=None):
    return sorted(xs, key=key)
d = {}
for i, w in enumerate(['pear', 'fig', 'apple']):
    d[w] = i
r = (f(d.keys(), key=len), d, 7 // -2)
";
    let first = repr_of(source, "r");
    for i in 0..100 {
        assert_eq!(repr_of(source, "r"), first, "diverged on iteration {i}");
    }
}
