//! Language-specific instruction blocks for code generation prompts.
//!
//! Selection only changes prompt text, never control flow. Languages are
//! matched by exact case-insensitive name; anything else gets a generic
//! block naming the requested language.

/// Returns the tooling instructions appended to a code generation prompt.
pub fn generation_instructions(language: &str) -> String {
    match language.to_lowercase().as_str() {
        "rust" => rust_instructions(),
        "python" => python_instructions(),
        "javascript" => javascript_instructions(),
        other => generic_instructions(other),
    }
}

/// Conventional source file name for a module in the target language, used
/// to verify the agent actually wrote its artifact. Unknown languages skip
/// the verification.
pub fn source_file_name(module_name: &str, language: &str) -> Option<String> {
    let extension = match language.to_lowercase().as_str() {
        "rust" => "rs",
        "python" => "py",
        "javascript" => "js",
        _ => return None,
    };
    Some(format!("{}.{}", module_name, extension))
}

fn rust_instructions() -> String {
    r#"## Rust-Specific Instructions

**Environment Setup:**
1. Create a new Cargo project structure if needed:
   ```bash
   cargo init --lib
   ```

**Code Organization:**
- Write implementation to `src/lib.rs` or `src/{module_name}.rs`
- Write tests in the same file using `#[cfg(test)]` modules
- Use proper error handling with `Result<T, E>`
- Follow Rust naming conventions

**Testing:**
- Run tests: `cargo test`
- Iterate until all tests pass

**Dependencies:**
- Add dependencies to `Cargo.toml` under `[dependencies]`
- Cargo will automatically download and compile them
"#
    .to_string()
}

fn python_instructions() -> String {
    r#"## Python-Specific Instructions

**Environment Setup:**
1. Create an isolated virtual environment using `uv`:
   ```bash
   uv venv .venv
   source .venv/bin/activate
   ```

2. If the module requires external dependencies:
   - Create a `requirements.txt` file listing all dependencies
   - Install them in the venv: `uv pip install -r requirements.txt`

**Code Organization:**
- Write implementation to `{module_name}.py`
- Write pytest tests to `test_{module_name}.py`
- Use type hints for all function signatures

**Testing:**
- Install pytest in the venv if needed: `uv pip install pytest`
- Run tests: `pytest test_{module_name}.py -v`
- Iterate until all tests pass

**Important:**
- DO NOT install packages globally or outside the venv
- DO NOT vendor (copy) library code into the project
"#
    .to_string()
}

fn javascript_instructions() -> String {
    r#"## JavaScript-Specific Instructions

**Environment Setup:**
1. Initialize npm project if needed:
   ```bash
   npm init -y
   ```

**Code Organization:**
- Write implementation to `{module_name}.js`
- Write Jest tests to `{module_name}.test.js`
- Use ES6+ features (const/let, arrow functions, async/await)

**Testing:**
- Install Jest: `npm install --save-dev jest`
- Add test script to package.json: `"test": "jest"`
- Run tests: `npm test`
- Iterate until all tests pass

**Dependencies:**
- Install via npm: `npm install <package>`
- Dependencies are local to this project (node_modules/)
"#
    .to_string()
}

fn generic_instructions(language: &str) -> String {
    format!(
        r#"## {language} Instructions

**Code Organization:**
- Write implementation following {language} conventions
- Write tests using the language's usual testing framework
- Iterate until all tests pass

**Dependencies:**
- Use {language}'s standard package manager
- Install dependencies locally to this project
"#,
        language = language
    )
}
