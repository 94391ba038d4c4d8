use handlebars::Handlebars;
use serde_json::{json, Value};
use std::path::Path;

use crate::core::constants::{shell, JAVA_PATH_KEYWORDS};
use crate::error::AppResult;
use crate::infrastructure::shell::platform::escape_shell_value;

const ENV_SCRIPT: &str = "env_script";
const STARTUP_BLOCK: &str = "startup_block";

/// 模板引擎包装器
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    /// 创建新的模板引擎
    pub fn new() -> AppResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(true);

        handlebars.register_helper("sh_escape", Box::new(handlebars_sh_escape));

        handlebars.register_template_string(ENV_SCRIPT, ENV_SCRIPT_TEMPLATE)?;
        handlebars.register_template_string(STARTUP_BLOCK, STARTUP_BLOCK_TEMPLATE)?;

        Ok(Self { handlebars })
    }

    /// 渲染模板
    pub fn render(&self, template_name: &str, data: &Value) -> AppResult<String> {
        Ok(self.handlebars.render(template_name, data)?)
    }

    /// 生成被 source 的 jvt.sh
    ///
    /// 脚本在加载时按与进程内相同的规则清理 `$PATH`，然后把 `$JAVA_HOME/bin` 放在最前。
    pub fn env_script(&self, java_home: &Path, install_root: &Path) -> AppResult<String> {
        let data = json!({
            "java_home": java_home.display().to_string(),
            "managed_prefix": escape_shell_value(&install_root.display().to_string().to_lowercase()),
            "keywords": JAVA_PATH_KEYWORDS,
        });
        self.render(ENV_SCRIPT, &data)
    }

    /// 生成写入 shell 启动文件的代码块
    pub fn startup_block(&self, base_dir: &Path, script_path: &Path) -> AppResult<String> {
        let data = json!({
            "begin": shell::BLOCK_BEGIN,
            "end": shell::BLOCK_END,
            "base_dir": base_dir.display().to_string(),
            "script_path": script_path.display().to_string(),
        });
        self.render(STARTUP_BLOCK, &data)
    }
}

fn handlebars_sh_escape(
    h: &handlebars::Helper,
    _: &handlebars::Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    if let Some(param) = h.param(0) {
        let value = param.value().as_str().unwrap_or("");
        out.write(&escape_shell_value(value))?;
    }
    Ok(())
}

const ENV_SCRIPT_TEMPLATE: &str = r#"# Generated by jvt. Rewritten on every 'jvt use'.
export JAVA_HOME="{{sh_escape java_home}}"

__jvt_rest="$PATH:"
__jvt_path=""
while [ -n "$__jvt_rest" ]; do
    __jvt_entry="${__jvt_rest%%:*}"
    __jvt_rest="${__jvt_rest#*:}"
    [ -z "$__jvt_entry" ] && continue
    __jvt_lower=$(printf '%s' "$__jvt_entry" | tr '[:upper:]' '[:lower:]')
    case "$__jvt_lower" in
        "{{managed_prefix}}"*) continue ;;
        {{#each keywords}}*{{this}}*{{#unless @last}}|{{/unless}}{{/each}}) continue ;;
    esac
    __jvt_path="${__jvt_path:+$__jvt_path:}$__jvt_entry"
done
export PATH="$JAVA_HOME/bin${__jvt_path:+:$__jvt_path}"
unset __jvt_rest __jvt_path __jvt_entry __jvt_lower
"#;

const STARTUP_BLOCK_TEMPLATE: &str = r#"{{begin}}
export JVT_HOME="{{sh_escape base_dir}}"
[ -s "{{sh_escape script_path}}" ] && . "{{sh_escape script_path}}"

jvt() {
    command jvt "$@"
    local exit_code=$?
    if [ $exit_code -eq 0 ]; then
        case "$1" in
            use|install|upgrade)
                [ -s "{{sh_escape script_path}}" ] && . "{{sh_escape script_path}}"
                ;;
        esac
    fi
    return $exit_code
}
{{end}}
"#;
