//! Page instrumentation injected through `Page.addScriptToEvaluateOnNewDocument`
//! and `Runtime.evaluate`.

/// Widens the resource timing buffer before any page script runs and records
/// what the page itself asks for afterwards.
pub const BUFFER_WIDENING: &str = r#"(function () {
  var perf = window.performance;
  if (!perf || typeof perf.setResourceTimingBufferSize !== "function") {
    return;
  }
  perf.setResourceTimingBufferSize(999999);

  var setSize = perf.setResourceTimingBufferSize;
  perf.setResourceTimingBufferSize = function (limit) {
    window.__rtvRequestedBufferSize = limit;
    return setSize.call(perf, limit);
  };

  if (typeof perf.clearResourceTimings === "function") {
    var clear = perf.clearResourceTimings;
    perf.clearResourceTimings = function () {
      window.__rtvClearedTimings = true;
      return clear.call(perf);
    };
  }
})();"#;

/// Walks every accessible frame and returns a `PageTimingSnapshot` shaped object.
pub const GATHER_TIMING: &str = r#"(function () {
  var DEFAULT_BUFFER = 150;

  function accessible(frame) {
    try {
      void (frame.location && frame.location.href);
      void frame.document;
      return !!frame.performance;
    } catch (e) {
      return false;
    }
  }

  function collect(frame, depth) {
    var entries = [];
    try {
      if (!accessible(frame)) {
        return entries;
      }
      if (frame.frames) {
        for (var i = 0; i < frame.frames.length; i++) {
          entries = entries.concat(collect(frame.frames[i], depth + 1));
        }
      }
      if (typeof frame.performance.getEntriesByType !== "function") {
        return entries;
      }
      var list = frame.performance.getEntriesByType("resource") || [];
      for (var j = 0; j < list.length; j++) {
        var res = list[j];
        entries.push({
          name: res.name,
          initiatorType: res.initiatorType || "",
          transferSize: Math.max(0, Math.round(res.transferSize || 0)),
          decodedBodySize: Math.max(0, Math.round(res.decodedBodySize || 0)),
          noTao: res.responseStart === 0,
          responseStart: res.responseStart || 0,
          frameDepth: depth
        });
      }
    } catch (e) {
      // cross-origin frames throw on access
    }
    return entries;
  }

  var main = window.performance.getEntriesByType("resource").length;
  var requested = window.__rtvRequestedBufferSize;
  return {
    resources: collect(window, 0),
    bufferSize: typeof requested === "number" && requested > 0 ? Math.round(requested) : DEFAULT_BUFFER,
    exceededDefaultBuffer: main >= DEFAULT_BUFFER,
    mainFrameEntries: main
  };
})()"#;
