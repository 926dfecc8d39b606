use rbcst::{parse, render_diagnostics, Field, NodeKind};

fn sexp(source: &str) -> String {
    parse(source).expect("parse").to_sexp()
}

#[test]
fn spacing_decides_binary_minus_or_argument() {
    assert_eq!(
        sexp("a - b"),
        "(program (binary left: (identifier) right: (identifier)))"
    );
    assert_eq!(
        sexp("a -b"),
        "(program (method_call method: (identifier) arguments: (argument_list (unary operand: (identifier)))))"
    );
    let tree = parse("-1").expect("parse");
    assert_eq!(tree.to_sexp(), "(program (integer))");
    assert_eq!(tree.root.find_first(NodeKind::Integer).map(|node| node.text()), Some("-1".to_string()));
}

#[test]
fn keyword_and_binds_looser_than_assignment() {
    assert_eq!(
        sexp("a = b and c"),
        "(program (binary left: (assignment left: (identifier) right: (identifier)) right: (identifier)))"
    );
    assert_eq!(
        sexp("a = b && c"),
        "(program (assignment left: (identifier) right: (binary left: (identifier) right: (identifier))))"
    );
}

#[test]
fn blocks_bind_by_delimiter() {
    let braces = parse("foo bar baz { x }").expect("parse");
    let outer = braces.root.child_nodes().next().expect("outer");
    assert!(outer.child_by_field(Field::Block).is_none());
    let blocks = braces.root.find_all(NodeKind::Block);
    assert_eq!(blocks.len(), 1);
    let owner = braces
        .root
        .find_all(NodeKind::MethodCall)
        .into_iter()
        .find(|call| call.child_by_field(Field::Block).is_some())
        .expect("block owner");
    assert_eq!(owner.child_by_field(Field::Method).map(|node| node.text()), Some("baz".to_string()));

    let keywords = parse("foo bar baz do x end").expect("parse");
    let outer = keywords.root.child_nodes().next().expect("outer");
    assert_eq!(outer.child_by_field(Field::Method).map(|node| node.text()), Some("foo".to_string()));
    assert_eq!(
        outer.child_by_field(Field::Block).map(|node| node.kind),
        Some(NodeKind::DoBlock)
    );
}

#[test]
fn command_arguments_in_a_while_condition_leave_do_to_the_loop() {
    let tree = parse("while queue.pop do work end").expect("parse");
    assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
    assert!(tree.root.find_first(NodeKind::DoBlock).is_none());
    assert!(tree.root.find_first(NodeKind::While).is_some());
}

#[test]
fn realistic_file_round_trips_without_errors() {
    let source = r##"# frozen_string_literal: true

module Shop
  class Cart < Base
    attr_reader :items, :owner

    def initialize(owner, items = [], discount: 0, **options, &on_change)
      @owner = owner
      @items = items
      @discount = discount
      super()
    end

    def total
      sum = items.map { |item| item.price * item.quantity }.sum
      sum - (sum * @discount / 100.0)
    end

    def to_s = "#{owner}: #{items.size} items"

    def self.empty(owner)
      new(owner)
    end

    def checkout
      case total
      when 0 then return :empty
      when 1..100, 101...500 then :small
      else
        :large
      end
    rescue PaymentError => e
      log e.message
      raise
    ensure
      @items = []
    end
  end
end

cart = Shop::Cart.empty("ann")
cart.items << item unless item.blank
puts <<~SUMMARY
  Total: #{cart.total}
SUMMARY
"##;
    let tree = parse(source).expect("parse");
    assert_eq!(tree.text(), source);
    assert!(!tree.has_errors(), "{}", render_diagnostics("cart.rb", &tree.diagnostics));
    assert_eq!(tree.root.find_all(NodeKind::Method).len(), 4);
    assert_eq!(tree.root.find_all(NodeKind::SingletonMethod).len(), 1);
    assert_eq!(tree.root.find_all(NodeKind::When).len(), 2);
    assert!(tree.root.find_first(NodeKind::HeredocBody).is_some());
}

#[test]
fn recovery_keeps_parsing_after_errors() {
    let source = "def ok\n  1\nend\n\nx = (1 +\ny = [1, 2\nputs \"done\"\n";
    let tree = parse(source).expect("parse");
    assert_eq!(tree.text(), source);
    assert!(tree.has_errors());
    assert!(tree.root.find_first(NodeKind::Method).is_some());
    assert!(tree.diagnostics.len() >= 2);
    let rendered = render_diagnostics("broken.rb", &tree.diagnostics);
    assert!(rendered.starts_with("error[E15"));
    assert!(rendered.contains("broken.rb:"));
}

#[test]
fn unterminated_heredoc_is_reported() {
    let source = "text = <<EOS\nno terminator\n";
    let tree = parse(source).expect("parse");
    assert_eq!(tree.text(), source);
    assert!(tree.diagnostics.iter().any(|diag| diag.code == "E1002"));
}
