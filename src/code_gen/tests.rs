use indoc::indoc;
use pretty_assertions::assert_eq;

use super::{generate, GeneratorConfig};
use crate::{
    context::Context,
    parser,
    report::{CollectingReporter, Diagnostic},
    typer,
    util::test_utils::assert_errors,
};

fn compile_with(src: &str, config: &GeneratorConfig) -> (String, Vec<Diagnostic>) {
    let reporter = CollectingReporter::new();
    let stmts = parser::parse_source(src, "test.phs".into(), &reporter).unwrap();
    let mut context = Context::default();
    let typed = typer::type_program(&stmts, &mut context, &reporter);
    let php = generate(&stmts, &typed.table, &mut context, config, &reporter);
    (php, reporter.take())
}

#[track_caller]
fn assert_php(src: &str, expected: &str) {
    let (php, errors) = compile_with(src, &GeneratorConfig::default());
    assert_errors(&errors, &[]);
    assert_eq!(php, expected);
}

#[test]
fn test_variables_and_concatenation() {
    assert_php(
        indoc! {r#"
            var name = "World"
            var greeting = "Hello " + name
            var total = 1 + 2
        "#},
        indoc! {r#"
            <?php
            $name = "World";
            $greeting = "Hello " . $name;
            $total = 1 + 2;
        "#},
    );
}

#[test]
fn test_nullable_strings_dispatch_as_strings() {
    assert_php(
        indoc! {r#"
            var name: ?String = null
            var message = "Hi ${name}!"
            var size = name.length
        "#},
        indoc! {r#"
            <?php
            $name = null;
            $message = "Hi " . ($name) . "!";
            $size = \Std\PhaseString::wrap($name)->length;
        "#},
    );
}

#[test]
fn test_loops() {
    assert_php(
        indoc! {"
            function log(x) {}
            var items = [1, 2]
            for (i in 0...3) {
              log(i)
            }
            for (k: v in items) {
              log(v)
            }
        "},
        indoc! {r#"
            <?php
            function log($x)
            {
            }
            $items = new \Std\PhaseArray([1, 2]);
            for ($i = 0; $i < 3; $i++)
            {
                log($i);
            }
            foreach ($items as $k => $v)
            {
                log($v);
            }
        "#},
    );
}

#[test]
fn test_conditionals_and_while() {
    assert_php(
        indoc! {"
            function log(x) {}
            var a = 3
            while (a > 0) a = a - 1
            do { a++ } while (a < 3)
            if (a == 3) log(a)
            else {
              log(0)
            }
        "},
        indoc! {"
            <?php
            function log($x)
            {
            }
            $a = 3;
            while ($a > 0)
                $a = $a - 1;
            do
            {
                $a++;
            }
            while ($a < 3);
            if ($a === 3)
            {
                log($a);
            }
            else
            {
                log(0);
            }
        "},
    );
}

#[test]
fn test_switch_and_try() {
    assert_php(
        indoc! {"
            function log(x) {}
            var a = 1
            switch (a) {
              case 1:
                log(a)
              default:
                log(0)
            }
            try {
              log(a)
            } catch (e: Failure) {
              throw e
            }
            try {
              log(a)
            } catch (e) {
              log(e)
            }
        "},
        indoc! {r#"
            <?php
            function log($x)
            {
            }
            $a = 1;
            switch ($a)
            {
                case 1:
                    log($a);
                    break;
                default:
                    log(0);
                    break;
            }
            try
            {
                log($a);
            }
            catch (Failure $e)
            {
                throw $e;
            }
            try
            {
                log($a);
            }
            catch (\Throwable $e)
            {
                log($e);
            }
        "#},
    );
}

#[test]
fn test_lambdas_capture_free_variables() {
    assert_php(
        indoc! {"
            var factor = 2
            var scale = { |x| x * factor }
            var twice = function (y: Int): Int {
              return y * 2
            }
            var items = $[1, 2]
            var doubled = items.map { it * factor }
        "},
        indoc! {"
            <?php
            $factor = 2;
            $scale = function ($x = null) use ($factor) {
                return $x * $factor;
            };
            $twice = function (int $y): int {
                return $y * 2;
            };
            $items = [1, 2];
            $doubled = $items->map(function ($it = null) use ($factor) {
                return $it * $factor;
            });
        "},
    );
}

#[test]
fn test_declared_functions_are_called_by_name() {
    assert_php(
        indoc! {"
            function double(x: Int): Int { x * 2 }
            var n = double(4)
            var f = double
        "},
        indoc! {"
            <?php
            function double(int $x): int
            {
                return $x * 2;
            }
            $n = double(4);
            $f = double(...);
        "},
    );
}

#[test]
fn test_class_layout() {
    assert_php(
        indoc! {r#"
            function log(x) {}
            class User extends Model implements Named {
              const Table = "users"
              private static count: Int = 0
              name: String
              tags = [1, 2]
              new(this.name: String) {
                log(name)
              }
              greet(): String {
                return "Hi " + this.name
              }
            }
        "#},
        indoc! {r#"
            <?php
            function log($x)
            {
            }
            class User extends Model implements Named
            {
                public function __construct(string $name)
                {
                    $this->tags = new \Std\PhaseArray([1, 2]);
                    $this->name = $name;
                    log($name);
                }
                const Table = "users";
                protected static int $count = 0;
                public string $name;
                public $tags;
                public function greet(): string
                {
                    return "Hi " . $this->name;
                }
            }
        "#},
    );
}

#[test]
fn test_static_members_and_enums() {
    assert_php(
        indoc! {"
            enum Size as Int {
              Small
              Large
            }
            class Counter {
              static count = 0
              static bump() {
                static.count = static.count + 1
                return Size.Large
              }
            }
            var size = Size.Small
            Counter.bump()
        "},
        indoc! {"
            <?php
            class Size
            {
                const Small = 0;
                const Large = 1;
            }
            class Counter
            {
                public static $count = 0;
                public static function bump()
                {
                    static::$count = static::$count + 1;
                    return Size::Large;
                }
            }
            $size = Size::Small;
            Counter::bump();
        "},
    );
}

#[test]
fn test_properties_get_accessors() {
    assert_php(
        indoc! {"
            function log(x) {}
            class Box {
              size: Int {
                get { 1 }
                set { log(value) }
              }
            }
        "},
        indoc! {r#"
            <?php
            function log($x)
            {
            }
            class Box
            {
                public function __get_size(): int
                {
                    return 1;
                }
                public function __set_size(int $value)
                {
                    return log($value);
                }
                public function __get($name)
                {
                    return $this->{"__get_" . $name}();
                }
                public function __set($name, $value)
                {
                    $this->{"__set_" . $name}($value);
                }
            }
        "#},
    );
}

#[test]
fn test_deferred_initializers() {
    assert_php(
        indoc! {"
            class Cache extends Store {
              items = [:]
              static registry = [1]
            }
        "},
        indoc! {r"
            <?php
            class Cache extends Store
            {
                public function __construct(...$args)
                {
                    parent::__construct(...$args);
                    $this->items = new \Std\PhaseMap([]);
                }
                public $items;
                public static $registry;
            }
            Cache::$registry = new \Std\PhaseArray([1]);
        "},
    );
}

#[test]
fn test_interfaces_and_abstract_classes() {
    assert_php(
        indoc! {"
            interface Shape extends Named {
              area(): Int
            }
            class Square implements Shape {
              use Sides
              abstract side(): Int
              area(): Int { this.side() * this.side() }
            }
        "},
        indoc! {"
            <?php
            interface Shape extends Named
            {
                public function area(): int;
            }
            abstract class Square implements Shape
            {
                use Sides;
                public abstract function side(): int;
                public function area(): int
                {
                    return $this->side() * $this->side();
                }
            }
        "},
    );
}

#[test]
fn test_namespaces_and_imports() {
    assert_php(
        indoc! {r#"
            namespace App

            use Std::Io
            use Std::Text::{Format, pad, trim}
            use Std::print as show

            show(pad("a"))
        "#},
        indoc! {r#"
            <?php
            namespace App {
                use Std\Io;
                use Std\Text\Format;
                use function Std\Text\{pad, trim};
                use function Std\print as show;
                show(pad("a"));
            }
        "#},
    );
}

#[test]
fn test_expressions() {
    assert_php(
        indoc! {r#"
            class Point {
              new(this.x: Int) {}
            }
            var p = Point(x: 1)
            var label = if (p.x > 0) "pos" else "neg"
            var kind = match (p.x) {
              1 -> "one"
              default -> "many"
            }
            var ok = label is String
            var r = 0...3
            var upper = label.upper()
            var pi = 3.14
        "#},
        indoc! {r#"
            <?php
            class Point
            {
                public function __construct(int $x)
                {
                    $this->x = $x;
                }
                public int $x;
            }
            $p = new Point(x: 1);
            $label = $p->x > 0 ? "pos" : "neg";
            $kind = match ($p->x) {
                1 => "one",
                default => "many",
            };
            $ok = \is_string($label);
            $r = \range(0, 3 - 1);
            $upper = \Std\PhaseString::wrap($label)->upper();
            $pi = 3.14;
        "#},
    );
}

#[test]
fn test_nested_ternaries_are_grouped() {
    assert_php(
        indoc! {"
            var a = true
            var b = false
            var x = if (a) 1 else if (b) 2 else 3
            var y = if (if (a) b else a) 1 else 2
        "},
        indoc! {"
            <?php
            $a = true;
            $b = false;
            $x = $a ? 1 : ($b ? 2 : 3);
            $y = ($a ? $b : $a) ? 1 : 2;
        "},
    );
}

#[test]
fn test_stacked_prefix_operators_stay_apart() {
    assert_php(
        indoc! {"
            var x = 1
            var t = - -1
            var n = - -x
            var d = - --x
            var ok = !!true
        "},
        indoc! {"
            <?php
            $x = 1;
            $t = -(-1);
            $n = -(-$x);
            $d = -(--$x);
            $ok = !!true;
        "},
    );
}

#[test]
fn test_parent_calls() {
    let (php, _) = compile_with(
        indoc! {"
            class Child extends Base {
              new() {
                super.new()
              }
              run() {
                return super.run()
              }
            }
        "},
        &GeneratorConfig::default(),
    );
    assert_eq!(
        php,
        indoc! {"
            <?php
            class Child extends Base
            {
                public function __construct()
                {
                    parent::__construct();
                }
                public function run()
                {
                    return parent::run();
                }
            }
        "}
    );
}

#[test]
fn test_attributes_and_escapes() {
    assert_php(
        indoc! {r#"
            [Entity("users")]
            class User {}
            var s = 'say "hi" $x'
        "#},
        indoc! {r#"
            <?php
            #[Entity("users")]
            class User
            {
            }
            $s = "say \"hi\" \$x";
        "#},
    );
}

#[test]
fn test_dynamic_members_and_indexes() {
    let (php, errors) = compile_with(
        indoc! {r#"
            global config
            var key = "a"
            config.{key} = config[key]
            items[] = 1
        "#},
        &GeneratorConfig::default(),
    );
    assert_errors(&errors, &["Undeclared variable: items"]);
    assert_eq!(
        php,
        indoc! {r#"
            <?php
            global $config;
            $key = "a";
            $config->{($key)} = $config[$key];
            $items[] = 1;
        "#}
    );
}

#[test]
fn test_php7_omits_property_and_return_types() {
    let config = GeneratorConfig { php_version: 7 };
    let (php, _) = compile_with(
        indoc! {r#"
            [Entity]
            class A {
              name: String
              title(): String { "a" }
            }
        "#},
        &config,
    );
    assert_eq!(
        php,
        indoc! {r#"
            <?php
            class A
            {
                public $name;
                public function title()
                {
                    return "a";
                }
            }
        "#}
    );
}
