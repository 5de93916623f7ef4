//! Core statement and expression evaluator.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use pygrade_types::ast::*;
use pygrade_types::{Binding, Signature};
use tracing::{debug, trace};

use crate::builtins;
use crate::env::Environment;
use crate::error::{EvalError, EvalResult};
use crate::ops;
use crate::value::{BoundMethod, Builtin, Class, Function, FunctionBody, Instance, Value};

/// Resource bounds for one interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Every statement and expression evaluated costs one unit.
    pub gas_limit: u64,
    pub max_call_depth: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            gas_limit: 200_000,
            max_call_depth: 64,
        }
    }
}

/// How a statement finished.
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// The tree-walking interpreter: walks AST nodes and produces Values.
pub struct Interpreter {
    builtins: Environment,
    globals: Environment,
    /// Innermost scope of the code currently running.
    env: Environment,
    gas: u64,
    depth: u32,
    limits: Limits,
    output: String,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl Interpreter {
    pub fn new(limits: Limits) -> Self {
        let builtins = builtins::builtin_scope();
        let globals = builtins.child();
        Self {
            env: globals.clone(),
            globals,
            builtins,
            gas: 0,
            depth: 0,
            limits,
            output: String::new(),
        }
    }

    pub fn gas_used(&self) -> u64 {
        self.gas
    }

    /// Start a fresh gas budget, keeping every binding.
    pub fn refuel(&mut self) {
        self.gas = 0;
    }

    /// Everything `print` wrote.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub(crate) fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Look a name up the way module-level code would see it.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.globals.get(name)
    }

    pub(crate) fn builtin(&self, name: &str) -> Option<Value> {
        self.builtins.get(name)
    }

    fn tick(&mut self) -> EvalResult<()> {
        self.charge(1)
    }

    /// Consume gas. Returns an error once the limit is passed.
    pub(crate) fn charge(&mut self, units: u64) -> EvalResult<()> {
        self.gas = self.gas.saturating_add(units);
        if self.gas > self.limits.gas_limit {
            Err(EvalError::GasExhausted(self.limits.gas_limit))
        } else {
            Ok(())
        }
    }

    fn enter_call(&mut self) -> EvalResult<()> {
        if self.depth >= self.limits.max_call_depth {
            return Err(EvalError::RecursionLimit(self.limits.max_call_depth));
        }
        self.depth += 1;
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Modules
    // ══════════════════════════════════════════════════════════════════════

    pub fn exec_module(&mut self, module: &Module) -> EvalResult<()> {
        match self.exec_partial(module) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Execute top to bottom, stopping at the first failure. Bindings made
    /// before the failure are kept; the failure is returned.
    pub fn exec_partial(&mut self, module: &Module) -> Option<EvalError> {
        for stmt in &module.body {
            if let Err(error) = self.exec_top_level(stmt) {
                debug!(line = stmt.span.start_line, %error, "module execution stopped");
                return Some(error);
            }
        }
        trace!(gas = self.gas, "module executed");
        None
    }

    /// Parse and execute source text.
    pub fn exec_source(&mut self, source: &str) -> EvalResult<()> {
        let module = pygrade_parser::parse_source("<string>", source).map_err(|errors| {
            EvalError::Syntax(
                errors
                    .first()
                    .map(|e| e.message.clone())
                    .unwrap_or_default(),
            )
        })?;
        self.exec_module(&module)
    }

    /// Execute a module and return the value of its final statement when
    /// that statement is a bare expression.
    pub fn last_value(&mut self, module: &Module) -> EvalResult<Option<Value>> {
        let Some((last, rest)) = module.body.split_last() else {
            return Ok(None);
        };
        for stmt in rest {
            self.exec_top_level(stmt)?;
        }
        match &last.kind {
            StmtKind::Expr(expr) => {
                self.tick()?;
                self.eval_expr(expr).map(Some)
            }
            _ => {
                self.exec_top_level(last)?;
                Ok(None)
            }
        }
    }

    fn exec_top_level(&mut self, stmt: &Stmt) -> EvalResult<()> {
        match self.exec_stmt(stmt)? {
            Flow::Normal => Ok(()),
            Flow::Return(_) => Err(EvalError::Unsupported("'return' outside function".into())),
            Flow::Break | Flow::Continue => Err(EvalError::Unsupported(
                "'break' or 'continue' outside loop".into(),
            )),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════

    fn exec_block(&mut self, body: &[Stmt]) -> EvalResult<Flow> {
        for stmt in body {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> EvalResult<Flow> {
        self.tick()?;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval_expr(expr)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval_expr(value)?;
                for target in targets {
                    self.assign(target, value.clone())?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                self.exec_aug_assign(target, *op, value)?;
            }
            StmtKind::FunctionDef(def) => {
                let function = self.make_function(
                    &def.name.name,
                    &def.params,
                    FunctionBody::Block(def.body.clone()),
                )?;
                self.env.define(&def.name.name, function);
            }
            StmtKind::ClassDef(class) => self.exec_class_def(class)?,
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::If { test, body, orelse } => {
                return if self.eval_expr(test)?.is_truthy() {
                    self.exec_block(body)
                } else {
                    self.exec_block(orelse)
                };
            }
            StmtKind::While { test, body, orelse } => {
                while self.eval_expr(test)?.is_truthy() {
                    match self.exec_block(body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                return self.exec_block(orelse);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let iterable = self.eval_expr(iter)?;
                for item in self.iterate(&iterable)? {
                    self.assign(target, item)?;
                    match self.exec_block(body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                return self.exec_block(orelse);
            }
            StmtKind::Import(names) => self.exec_import(names),
            StmtKind::ImportFrom { module, names } => self.exec_import_from(module, names)?,
            StmtKind::Raise(exc) => {
                let message = match exc {
                    Some(expr) => exception_message(&self.eval_expr(expr)?),
                    None => "RuntimeError: No active exception to reraise".to_string(),
                };
                return Err(EvalError::Raised(message));
            }
            StmtKind::Assert { test, msg } => {
                if !self.eval_expr(test)?.is_truthy() {
                    let message = match msg {
                        Some(expr) => self.eval_expr(expr)?.to_display(),
                        None => String::new(),
                    };
                    return Err(EvalError::Assertion(message));
                }
            }
            StmtKind::Pass => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn make_function(
        &mut self,
        name: &str,
        params: &[Param],
        body: FunctionBody,
    ) -> EvalResult<Value> {
        let mut defaults = IndexMap::new();
        for param in params {
            if let Some(default) = &param.default {
                defaults.insert(param.name.name.clone(), self.eval_expr(default)?);
            }
        }
        Ok(Value::Function(Rc::new(Function {
            name: name.to_string(),
            signature: Signature::from_params(params),
            defaults,
            body,
            closure: self.env.clone(),
        })))
    }

    fn exec_class_def(&mut self, class: &ClassDef) -> EvalResult<()> {
        let mut bases = Vec::with_capacity(class.bases.len());
        for base in &class.bases {
            match self.eval_expr(base)? {
                Value::Class(c) => bases.push(c),
                other => {
                    return Err(EvalError::type_error(format!(
                        "cannot inherit from '{}'",
                        other.type_name()
                    )))
                }
            }
        }

        let body_env = self.env.child();
        let saved = std::mem::replace(&mut self.env, body_env.clone());
        let result = self.exec_block(&class.body);
        self.env = saved;
        result?;

        let attrs: IndexMap<String, Value> = body_env.local_bindings().into_iter().collect();
        let value = Value::Class(Rc::new(Class {
            name: class.name.name.clone(),
            bases,
            attrs: RefCell::new(attrs),
        }));
        self.env.define(&class.name.name, value);
        Ok(())
    }

    fn exec_import(&mut self, names: &[Alias]) {
        for alias in names {
            match &alias.asname {
                Some(asname) => self
                    .env
                    .define(&asname.name, builtins::import_module(&alias.name)),
                None => {
                    let top = alias.name.split('.').next().unwrap_or(&alias.name);
                    self.env.define(top, builtins::import_module(top));
                }
            }
        }
    }

    fn exec_import_from(&mut self, module: &str, names: &[Alias]) -> EvalResult<()> {
        let source = builtins::import_module(module);
        for alias in names {
            let value = self.get_attr(&source, &alias.name).map_err(|_| {
                EvalError::Raised(format!(
                    "ImportError: cannot import name '{}' from '{module}'",
                    alias.name
                ))
            })?;
            let bound_name = alias.asname.as_ref().map_or(&alias.name, |a| &a.name);
            self.env.define(bound_name, value);
        }
        Ok(())
    }

    // ── Assignment ───────────────────────────────────────────────────────

    fn assign(&mut self, target: &Expr, value: Value) -> EvalResult<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                self.env.define(name, value);
                Ok(())
            }
            ExprKind::Attribute { value: object, attr } => {
                let object = self.eval_expr(object)?;
                set_attr(&object, &attr.name, value)
            }
            ExprKind::Subscript { value: object, index } => {
                let object = self.eval_expr(object)?;
                let index = self.eval_expr(index)?;
                set_item(&object, index, value)
            }
            ExprKind::Tuple(targets) | ExprKind::List(targets) => {
                self.assign_unpacked(targets, value)
            }
            _ => Err(EvalError::Unsupported("cannot assign to expression".into())),
        }
    }

    fn assign_unpacked(&mut self, targets: &[Expr], value: Value) -> EvalResult<()> {
        let mut items = self.iterate(&value)?;
        let starred = targets
            .iter()
            .position(|t| matches!(t.kind, ExprKind::Starred(_)));

        let Some(star) = starred else {
            if items.len() != targets.len() {
                return Err(EvalError::Value(if items.len() > targets.len() {
                    format!("too many values to unpack (expected {})", targets.len())
                } else {
                    format!(
                        "not enough values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    )
                }));
            }
            for (target, item) in targets.iter().zip(items) {
                self.assign(target, item)?;
            }
            return Ok(());
        };

        if items.len() < targets.len() - 1 {
            return Err(EvalError::Value(format!(
                "not enough values to unpack (expected at least {}, got {})",
                targets.len() - 1,
                items.len()
            )));
        }
        let after = targets.len() - star - 1;
        let tail = items.split_off(items.len() - after);
        let middle = items.split_off(star);
        for (target, item) in targets[..star].iter().zip(items) {
            self.assign(target, item)?;
        }
        if let ExprKind::Starred(inner) = &targets[star].kind {
            self.assign(inner, Value::list(middle))?;
        }
        for (target, item) in targets[star + 1..].iter().zip(tail) {
            self.assign(target, item)?;
        }
        Ok(())
    }

    fn exec_aug_assign(&mut self, target: &Expr, op: BinOp, value: &Expr) -> EvalResult<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                let current = self.lookup_name(name)?;
                let rhs = self.eval_expr(value)?;
                let updated = self.augmented(op, &current, rhs)?;
                self.env.define(name, updated);
                Ok(())
            }
            ExprKind::Attribute { value: object, attr } => {
                let object = self.eval_expr(object)?;
                let current = self.get_attr(&object, &attr.name)?;
                let rhs = self.eval_expr(value)?;
                let updated = self.augmented(op, &current, rhs)?;
                set_attr(&object, &attr.name, updated)
            }
            ExprKind::Subscript { value: object, index } => {
                let object = self.eval_expr(object)?;
                let index = self.eval_expr(index)?;
                let current = get_item(&object, &index)?;
                let rhs = self.eval_expr(value)?;
                let updated = self.augmented(op, &current, rhs)?;
                set_item(&object, index, updated)
            }
            _ => Err(EvalError::Unsupported(
                "illegal expression for augmented assignment".into(),
            )),
        }
    }

    /// `+=` on a list extends it in place; everything else rebinds.
    fn augmented(&mut self, op: BinOp, current: &Value, rhs: Value) -> EvalResult<Value> {
        if let (BinOp::Add, Value::List(items)) = (op, current) {
            let extra = self.iterate(&rhs)?;
            let mut items = items.borrow_mut();
            ops::check_len(items.len().saturating_add(extra.len()))?;
            items.extend(extra);
            return Ok(current.clone());
        }
        ops::binary(op, current, &rhs)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════════

    /// Evaluate an expression in the current scope.
    pub fn eval_expr(&mut self, expr: &Expr) -> EvalResult<Value> {
        self.tick()?;
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(f) => Ok(Value::Float(*f)),
            ExprKind::Str(s) => Ok(Value::str(s)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::NoneLit => Ok(Value::None),

            ExprKind::List(elts) => Ok(Value::list(self.eval_elements(elts)?)),
            ExprKind::Tuple(elts) => Ok(Value::tuple(self.eval_elements(elts)?)),
            ExprKind::Set(elts) => Ok(Value::set(self.eval_elements(elts)?)),
            ExprKind::Dict { keys, values } => {
                let mut pairs = Vec::with_capacity(keys.len());
                for (key, value) in keys.iter().zip(values) {
                    let key = self.eval_expr(key)?;
                    let value = self.eval_expr(value)?;
                    dict_insert(&mut pairs, key, value);
                }
                Ok(Value::dict(pairs))
            }

            ExprKind::Name(name) => self.lookup_name(name),
            ExprKind::Attribute { value, attr } => {
                let object = self.eval_expr(value)?;
                self.get_attr(&object, &attr.name)
            }
            ExprKind::Subscript { value, index } => {
                let object = self.eval_expr(value)?;
                if let ExprKind::Slice { lower, upper, step } = &index.kind {
                    return self.eval_slice(&object, lower, upper, step);
                }
                let index = self.eval_expr(index)?;
                get_item(&object, &index)
            }
            ExprKind::Slice { .. } => {
                Err(EvalError::Unsupported("slice outside a subscript".into()))
            }
            ExprKind::Call(call) => self.eval_call(call),
            ExprKind::Starred(_) => Err(EvalError::Unsupported(
                "starred expression in this position".into(),
            )),

            ExprKind::BinOp { left, op, right } => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                ops::binary(*op, &l, &r)
            }
            ExprKind::UnaryOp { op, operand } => {
                let v = self.eval_expr(operand)?;
                ops::unary(*op, &v)
            }
            ExprKind::BoolOp { op, values } => self.eval_bool_op(*op, values),
            ExprKind::Compare {
                left,
                ops: cmp_ops,
                comparators,
            } => self.eval_compare(left, cmp_ops, comparators),
            ExprKind::IfExp { test, body, orelse } => {
                if self.eval_expr(test)?.is_truthy() {
                    self.eval_expr(body)
                } else {
                    self.eval_expr(orelse)
                }
            }
            ExprKind::Lambda { params, body } => {
                self.make_function("<lambda>", params, FunctionBody::Expr((**body).clone()))
            }
        }
    }

    fn lookup_name(&self, name: &str) -> EvalResult<Value> {
        self.env
            .get(name)
            .ok_or_else(|| EvalError::Name(name.to_string()))
    }

    /// Evaluate display or argument elements, expanding `*iterable`.
    fn eval_elements(&mut self, elts: &[Expr]) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(elts.len());
        for elt in elts {
            if let ExprKind::Starred(inner) = &elt.kind {
                let iterable = self.eval_expr(inner)?;
                values.extend(self.iterate(&iterable)?);
            } else {
                values.push(self.eval_expr(elt)?);
            }
        }
        Ok(values)
    }

    fn eval_bool_op(&mut self, op: BoolOp, values: &[Expr]) -> EvalResult<Value> {
        let mut last = Value::None;
        for expr in values {
            last = self.eval_expr(expr)?;
            let short_circuit = match op {
                BoolOp::And => !last.is_truthy(),
                BoolOp::Or => last.is_truthy(),
            };
            if short_circuit {
                break;
            }
        }
        Ok(last)
    }

    fn eval_compare(
        &mut self,
        left: &Expr,
        cmp_ops: &[CmpOp],
        comparators: &[Expr],
    ) -> EvalResult<Value> {
        let mut current = self.eval_expr(left)?;
        for (op, right) in cmp_ops.iter().zip(comparators) {
            let next = self.eval_expr(right)?;
            if !ops::compare(*op, &current, &next)? {
                return Ok(Value::Bool(false));
            }
            current = next;
        }
        Ok(Value::Bool(true))
    }

    fn eval_slice(
        &mut self,
        object: &Value,
        lower: &Option<Box<Expr>>,
        upper: &Option<Box<Expr>>,
        step: &Option<Box<Expr>>,
    ) -> EvalResult<Value> {
        let lower = self.slice_bound(lower)?;
        let upper = self.slice_bound(upper)?;
        let step = self.slice_bound(step)?.unwrap_or(1);
        if step == 0 {
            return Err(EvalError::Value("slice step cannot be zero".into()));
        }
        match object {
            Value::List(items) => {
                let items = items.borrow();
                let picked = slice_indices(items.len(), lower, upper, step);
                Ok(Value::list(picked.into_iter().map(|i| items[i].clone()).collect()))
            }
            Value::Tuple(items) => {
                let picked = slice_indices(items.len(), lower, upper, step);
                Ok(Value::tuple(picked.into_iter().map(|i| items[i].clone()).collect()))
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let picked = slice_indices(chars.len(), lower, upper, step);
                Ok(Value::str(picked.into_iter().map(|i| chars[i]).collect::<String>()))
            }
            other => Err(EvalError::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    fn slice_bound(&mut self, bound: &Option<Box<Expr>>) -> EvalResult<Option<i64>> {
        let Some(expr) = bound else {
            return Ok(None);
        };
        match self.eval_expr(expr)? {
            Value::None => Ok(None),
            Value::Int(n) => Ok(Some(n)),
            Value::Bool(b) => Ok(Some(i64::from(b))),
            other => Err(EvalError::type_error(format!(
                "slice indices must be integers or None, not {}",
                other.type_name()
            ))),
        }
    }

    // ── Calls ────────────────────────────────────────────────────────────

    fn eval_call(&mut self, call: &Call) -> EvalResult<Value> {
        let callee = self.eval_expr(&call.func)?;
        let args = self.eval_elements(&call.args)?;
        let mut kwargs = Vec::with_capacity(call.keywords.len());
        for keyword in &call.keywords {
            let value = self.eval_expr(&keyword.value)?;
            match (&keyword.arg, value) {
                (Some(name), value) => kwargs.push((name.name.clone(), value)),
                (None, Value::Dict(pairs)) => {
                    for (key, value) in pairs.borrow().iter() {
                        let Value::Str(key) = key else {
                            return Err(EvalError::type_error("keywords must be strings"));
                        };
                        kwargs.push((key.to_string(), value.clone()));
                    }
                }
                (None, other) => {
                    return Err(EvalError::type_error(format!(
                        "argument after ** must be a mapping, not {}",
                        other.type_name()
                    )))
                }
            }
        }
        self.call(&callee, args, kwargs)
    }

    /// Call any callable value.
    pub fn call(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        match callee {
            Value::Function(function) => self.call_function(function, args, kwargs),
            Value::Builtin(builtin) => self.call_builtin(builtin, args, kwargs),
            Value::BoundMethod(method) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(method.receiver.clone());
                full.extend(args);
                self.call(&method.func, full, kwargs)
            }
            Value::Class(class) => self.instantiate(class, args, kwargs),
            Value::Opaque(path) => Ok(Value::Opaque(Rc::from(format!("{path}()")))),
            other => Err(EvalError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(
        &mut self,
        function: &Rc<Function>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        let mut bound = function
            .signature
            .bind(args, kwargs)
            .map_err(|error| EvalError::Binding {
                callee: function.name.clone(),
                error,
            })?;
        bound.apply_defaults();

        let scope = function.closure.child();
        for (param, binding) in bound.into_entries() {
            let value = match binding {
                Binding::Value(v) => v,
                Binding::Default => function
                    .defaults
                    .get(&param.name)
                    .cloned()
                    .unwrap_or(Value::None),
                Binding::VarPositional(items) => Value::tuple(items),
                Binding::VarKeyword(pairs) => keyword_dict(pairs),
            };
            scope.define(&param.name, value);
        }

        self.enter_call()?;
        let saved = std::mem::replace(&mut self.env, scope);
        let result = match &function.body {
            FunctionBody::Block(body) => self.exec_block(body).map(|flow| match flow {
                Flow::Return(value) => value,
                _ => Value::None,
            }),
            FunctionBody::Expr(expr) => self.eval_expr(expr),
        };
        self.env = saved;
        self.depth -= 1;
        result
    }

    fn call_builtin(
        &mut self,
        builtin: &Rc<Builtin>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        let Some(signature) = &builtin.signature else {
            return (builtin.func)(self, args, kwargs);
        };
        let mut bound = signature
            .bind(args, kwargs)
            .map_err(|error| EvalError::Binding {
                callee: builtin.name.clone(),
                error,
            })?;
        bound.apply_defaults();

        let mut values = Vec::with_capacity(signature.params.len());
        for (param, binding) in bound.into_entries() {
            values.push(match binding {
                Binding::Value(v) => v,
                Binding::Default => match &param.default {
                    Some(default) => self.eval_expr(default)?,
                    None => Value::None,
                },
                Binding::VarPositional(items) => Value::tuple(items),
                Binding::VarKeyword(pairs) => keyword_dict(pairs),
            });
        }
        (builtin.func)(self, values, Vec::new())
    }

    fn instantiate(
        &mut self,
        class: &Rc<Class>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        let instance = Value::Instance(Rc::new(Instance {
            class: Rc::clone(class),
            attrs: RefCell::new(IndexMap::new()),
        }));
        match class.lookup("__init__") {
            Some(init) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(instance.clone());
                full.extend(args);
                let returned = self.call(&init, full, kwargs)?;
                if !matches!(returned, Value::None) {
                    return Err(EvalError::type_error(format!(
                        "__init__() should return None, not '{}'",
                        returned.type_name()
                    )));
                }
            }
            None if !args.is_empty() || !kwargs.is_empty() => {
                return Err(EvalError::type_error(format!(
                    "{}() takes no arguments",
                    class.name
                )))
            }
            None => {}
        }
        Ok(instance)
    }

    // ── Attributes & iteration ───────────────────────────────────────────

    /// Attribute lookup on a live value. Functions found on a class are
    /// bound to the instance they were reached through.
    pub fn get_attr(&mut self, object: &Value, name: &str) -> EvalResult<Value> {
        let found = match object {
            Value::Instance(instance) => {
                let own = instance.attrs.borrow().get(name).cloned();
                own.or_else(|| {
                    instance
                        .class
                        .lookup(name)
                        .map(|attr| bind_to(object, attr))
                })
            }
            Value::Class(class) => class.lookup(name),
            Value::Module(module) => module.attrs.get(name).cloned(),
            Value::Opaque(path) => Some(Value::Opaque(Rc::from(format!("{path}.{name}")))),
            _ => builtins::method(object, name).map(|func| bind_to(object, func)),
        };
        found.ok_or_else(|| attribute_error(object, name))
    }

    /// The items of an iterable, materialized.
    pub(crate) fn iterate(&mut self, value: &Value) -> EvalResult<Vec<Value>> {
        let items = match value {
            Value::List(items) | Value::Set(items) => items.borrow().clone(),
            Value::Tuple(items) => items.to_vec(),
            Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
            Value::Dict(pairs) => pairs.borrow().iter().map(|(k, _)| k.clone()).collect(),
            other => {
                return Err(EvalError::type_error(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )))
            }
        };
        Ok(items)
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════

fn bind_to(receiver: &Value, attr: Value) -> Value {
    match attr {
        Value::Function(_) | Value::Builtin(_) => Value::BoundMethod(Rc::new(BoundMethod {
            receiver: receiver.clone(),
            func: attr,
        })),
        other => other,
    }
}

fn attribute_error(object: &Value, name: &str) -> EvalError {
    EvalError::Attribute(match object {
        Value::Module(module) => format!("module '{}' has no attribute '{name}'", module.name),
        Value::Class(class) => format!("type object '{}' has no attribute '{name}'", class.name),
        other => format!("'{}' object has no attribute '{name}'", other.type_name()),
    })
}

fn set_attr(object: &Value, name: &str, value: Value) -> EvalResult<()> {
    match object {
        Value::Instance(instance) => {
            instance.attrs.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        Value::Class(class) => {
            class.attrs.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        other => Err(attribute_error(other, name)),
    }
}

fn keyword_dict(pairs: Vec<(String, Value)>) -> Value {
    Value::dict(pairs.into_iter().map(|(k, v)| (Value::str(k), v)).collect())
}

/// Insert or replace, keeping first-insertion order.
pub(crate) fn dict_insert(pairs: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    match pairs.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => pairs.push((key, value)),
    }
}

/// What a `raise` reports for the raised value.
fn exception_message(value: &Value) -> String {
    match value {
        Value::Class(class) => class.name.clone(),
        Value::Instance(instance) => {
            let args = instance.attrs.borrow().get("args").cloned();
            match args {
                Some(Value::Tuple(items)) if items.len() == 1 => {
                    format!("{}: {}", instance.class.name, items[0].to_display())
                }
                Some(Value::Tuple(items)) if !items.is_empty() => {
                    format!("{}: {}", instance.class.name, Value::Tuple(items).repr())
                }
                _ => instance.class.name.clone(),
            }
        }
        other => other.to_display(),
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

fn int_index(index: &Value, container: &str) -> EvalResult<i64> {
    match index {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(EvalError::type_error(format!(
            "{container} indices must be integers or slices, not {}",
            other.type_name()
        ))),
    }
}

pub(crate) fn get_item(object: &Value, index: &Value) -> EvalResult<Value> {
    match object {
        Value::List(items) => {
            let items = items.borrow();
            normalize_index(int_index(index, "list")?, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| EvalError::Index("list index out of range".into()))
        }
        Value::Tuple(items) => normalize_index(int_index(index, "tuple")?, items.len())
            .map(|i| items[i].clone())
            .ok_or_else(|| EvalError::Index("tuple index out of range".into())),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            normalize_index(int_index(index, "string")?, chars.len())
                .map(|i| Value::str(chars[i].to_string()))
                .ok_or_else(|| EvalError::Index("string index out of range".into()))
        }
        Value::Dict(pairs) => pairs
            .borrow()
            .iter()
            .find(|(k, _)| k == index)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| EvalError::Key(index.repr())),
        other => Err(EvalError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn set_item(object: &Value, index: Value, value: Value) -> EvalResult<()> {
    match object {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = normalize_index(int_index(&index, "list")?, items.len())
                .ok_or_else(|| EvalError::Index("list assignment index out of range".into()))?;
            items[i] = value;
            Ok(())
        }
        Value::Dict(pairs) => {
            dict_insert(&mut pairs.borrow_mut(), index, value);
            Ok(())
        }
        other => Err(EvalError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// Indices selected by `[lower:upper:step]` on a sequence of `len` items.
fn slice_indices(len: usize, lower: Option<i64>, upper: Option<i64>, step: i64) -> Vec<usize> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let adjust = |v: i64| if v < 0 { v + len } else { v };
    let mut picked = Vec::new();
    if step > 0 {
        let start = lower.map_or(0, adjust).clamp(0, len);
        let stop = upper.map_or(len, adjust).clamp(0, len);
        let mut i = start;
        while i < stop {
            picked.push(i as usize);
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    } else {
        let start = lower.map_or(len - 1, adjust).clamp(-1, len - 1);
        let stop = upper.map_or(-1, adjust).clamp(-1, len - 1);
        let mut i = start;
        while i > stop {
            picked.push(i as usize);
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_indices() {
        assert_eq!(slice_indices(5, Some(1), Some(3), 1), vec![1, 2]);
        assert_eq!(slice_indices(5, None, None, 2), vec![0, 2, 4]);
        assert_eq!(slice_indices(5, None, None, -1), vec![4, 3, 2, 1, 0]);
        assert_eq!(slice_indices(5, Some(-2), None, 1), vec![3, 4]);
        assert_eq!(slice_indices(3, Some(10), None, 1), Vec::<usize>::new());
        assert_eq!(slice_indices(0, None, None, -1), Vec::<usize>::new());
    }

    #[test]
    fn test_normalize_index() {
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-4, 3), None);
    }

    #[test]
    fn test_dict_insert_replaces_equal_key() {
        let mut pairs = Vec::new();
        dict_insert(&mut pairs, Value::Int(1), Value::str("a"));
        dict_insert(&mut pairs, Value::Float(1.0), Value::str("b"));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, Value::str("b"));
    }
}
